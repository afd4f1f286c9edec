//! `find` subcommand — show the matched device and its unique id.

use super::{
    DevmuteError, FindOutput, GlobalOpts, Result, effective_config, kv, kv_width, open_manager,
    print_json,
};
use devmute_lib::error::MatchFailure;

pub(super) fn cmd_find(opts: &GlobalOpts, query: &str) -> Result<()> {
    let config = effective_config(opts);
    let manager = open_manager(&config)?;

    let device = manager
        .catalog()
        .find_by_query(query)
        .cloned()
        .ok_or_else(|| DevmuteError::NoUniqueMatch {
            query: query.to_string(),
            reason: MatchFailure::NotInCatalog,
        })?;
    let unique_id = manager.resolve_unique(query)?;

    if opts.json {
        return print_json(&FindOutput {
            query: query.to_string(),
            device,
            unique_id,
        });
    }

    let w = kv_width(&["Name:", "Id:", "Unique id:"], &[]);
    kv("Name:", &device.name, w);
    kv("Id:", &device.id, w);
    kv("Unique id:", &unique_id, w);
    Ok(())
}
