use colony_core::{BinaryVersion, DeploymentContext};

/// Format a build age as `"Ns"`, `"Nm"`, `"Nh"` or `"NhMm"`.
pub(crate) fn format_age(age_secs: i64) -> String {
    let age_secs = age_secs.max(0);
    if age_secs < 60 {
        return format!("{age_secs}s");
    }
    if age_secs < 3600 {
        return format!("{}m", age_secs / 60);
    }
    let hours = age_secs / 3600;
    let minutes = (age_secs % 3600) / 60;
    if minutes == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h{minutes}m")
    }
}

/// Resolve the latest and previous build of a service into deployment
/// context. `versions` are newest first.
pub(crate) fn resolve_deployment(versions: &[BinaryVersion], now: i64) -> Option<DeploymentContext> {
    let latest = versions.first()?;
    Some(DeploymentContext {
        build_id: latest.build_id.clone(),
        first_seen: latest.first_seen,
        version_age: format_age(now - latest.first_seen),
        previous_build_id: versions.get(1).map(|v| v.build_id.clone()),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formats_all_four_shapes() {
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(300), "5m");
        assert_eq!(format_age(7200), "2h");
        assert_eq!(format_age(7200 + 720), "2h12m");
        assert_eq!(format_age(-5), "0s");
    }

    #[test]
    fn picks_latest_and_previous() {
        let versions = vec![
            BinaryVersion {
                service: "svc".into(),
                build_id: "new".into(),
                first_seen: 1_000,
            },
            BinaryVersion {
                service: "svc".into(),
                build_id: "old".into(),
                first_seen: 500,
            },
        ];
        let ctx = resolve_deployment(&versions, 1_060).unwrap();
        assert_eq!(ctx.build_id, "new");
        assert_eq!(ctx.version_age, "1m");
        assert_eq!(ctx.previous_build_id.as_deref(), Some("old"));

        assert!(resolve_deployment(&[], 0).is_none());
    }
}
