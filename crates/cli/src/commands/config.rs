use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use picturebot_core::Library;

pub fn list(library: &Library) -> Result<()> {
    let settings = library.list_settings()?;
    if settings.is_empty() {
        println!("No settings stored; defaults apply.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("Key"), Cell::new("Value")]);
    for (key, value) in settings {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    println!("{table}");
    Ok(())
}

pub fn get(library: &Library, key: &str) -> Result<()> {
    match library.get_setting(key)? {
        Some(value) => println!("{value}"),
        None => println!("{key} is not set"),
    }
    Ok(())
}

pub fn set(library: &mut Library, key: &str, value: &str) -> Result<()> {
    library.set_setting(key, value)?;
    println!("{key} = {value}");
    Ok(())
}
