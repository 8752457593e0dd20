use crate::domain::models::JsonOut;
use serde::Serialize;

/// `{"ok": .., "data": ..}` envelope under `--json`, otherwise `row(data)`.
pub fn print_one<T: Serialize>(
    json: bool,
    ok: bool,
    data: T,
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&JsonOut { ok, data })?);
    } else {
        println!("{}", row(&data));
    }
    Ok(())
}
