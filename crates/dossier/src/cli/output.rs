//! Terminal rendering shared by the subcommands: tables, sizes, hours and
//! category colours.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use dossier::classify::category_colors;
use dossier::tagging::TagColor;
use dossier::Category;

/// Binary units, one decimal above bytes: `1536` is `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub fn format_hours(hours: f64) -> String {
    format!("{:.2} h", hours)
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = new_table(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{}", table);
}

/// Like [`print_table`], with an optional foreground colour per cell.
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = new_table(headers);
    for row in rows {
        table.add_row(row.into_iter().map(|(text, color)| {
            let cell = Cell::new(text);
            match color {
                Some(color) => cell.fg(color),
                None => cell,
            }
        }));
    }
    println!("{}", table);
}

/// Terminal colour for a category, following its tag colour.
pub fn color_for_category(category: &str) -> Option<Color> {
    let tag = *category_colors().get(&Category::new(category))?;
    Some(match tag {
        TagColor::Green => Color::Green,
        TagColor::Blue => Color::Blue,
        TagColor::Yellow => Color::Yellow,
        TagColor::Purple => Color::Magenta,
        TagColor::Orange => Color::DarkYellow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier::classify::{FORM, TEACHING};

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(1.5), "1.50 h");
        assert_eq!(format_hours(0.0), "0.00 h");
    }

    #[test]
    fn test_color_follows_tag_color() {
        assert_eq!(color_for_category(TEACHING), Some(Color::Green));
        assert_eq!(color_for_category(FORM), Some(Color::DarkYellow));
        assert_eq!(color_for_category("Unclassified"), None);
    }
}
