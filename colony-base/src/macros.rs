#[macro_export]
/// Shortcut for aborting a joinhandle and then awaiting and discarding its
/// result
macro_rules! cancel_task {
    ($task:ident) => {
        #[allow(unused_must_use)]
        {
            let t = $task.into_inner();
            t.abort();
            t.await;
        }
    };
}

/// Export this so callers don't need to import paste.
#[doc(hidden)]
pub use paste;
use serde::Deserialize;

#[macro_export]
/// Declare a new settings block for an agent binary.
///
/// The generated struct wraps [`crate::Settings`] and adds the specified
/// fields. Integers must be specified as `String` so they can be set via env
/// var; parse them in `from_settings`.
///
/// ### Usage
///
/// ```ignore
/// decl_settings!(Colony {
///    pollintervalsecs: Option<String>,
/// });
/// ```
macro_rules! decl_settings {
    (
        $name:ident {
            $($(#[$tags:meta])* $prop:ident: $type:ty,)*
        }
    ) => {
        colony_base::macros::paste::paste! {
            #[derive(Debug, serde::Deserialize)]
            #[serde(rename_all = "camelCase")]
            #[doc = "Settings for `" $name]
            pub struct [<$name Settings>] {
                #[serde(flatten)]
                pub(crate) base: colony_base::Settings,
                $(
                    $(#[$tags])*
                    pub(crate) $prop: $type,
                )*
            }

            impl std::ops::Deref for [<$name Settings>] {
                type Target = colony_base::Settings;

                fn deref(&self) -> &Self::Target {
                    &self.base
                }
            }

            impl AsRef<colony_base::Settings> for [<$name Settings>] {
                fn as_ref(&self) -> &colony_base::Settings {
                    &self.base
                }
            }

            impl colony_base::NewFromSettings for [<$name Settings>] {
                type Error = eyre::Report;

                /// See `load_settings_object` for how settings are loaded.
                fn new() -> Result<Self, Self::Error> {
                    colony_base::macros::_new_settings(stringify!($name))
                }
            }
        }
    }
}

/// Static logic called by the decl_settings! macro. Do not call directly!
pub fn _new_settings<'de, T: Deserialize<'de>>(name: &str) -> eyre::Result<T> {
    use crate::settings;
    use std::env;

    settings::load_settings_object::<_, &str>(
        name,
        Some(&env::var("BASE_CONFIG").unwrap_or_else(|_| "base".into())),
        &[],
    )
}
