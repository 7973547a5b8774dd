//! Colony coordinator configuration. Everything the coordinator needs lives
//! in the shared base settings block; the macro wires up loading from
//! `config/$RUN_ENV/` plus `COL_BASE_*` / `COL_COLONY_*` env overrides.

use colony_base::decl_settings;

decl_settings!(Colony {});
