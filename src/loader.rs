use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};

use crate::models::{Cell, Table};

pub fn read_table(csv_path: &Path) -> anyhow::Result<Table> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let table =
        parse_table(file).with_context(|| format!("failed to parse {}", csv_path.display()))?;
    tracing::info!(
        path = %csv_path.display(),
        rows = table.row_count(),
        columns = table.headers.len(),
        "read table"
    );
    Ok(table)
}

/// Parses CSV with a header row. Record lengths may vary; cells are typed by content.
pub fn parse_table<R: Read>(input: R) -> anyhow::Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .context("missing header row")?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|header| header.is_empty()) {
        bail!("header row is empty");
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(Cell::parse).collect());
    }

    Ok(Table::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_headers_and_typed_cells() {
        let input = "Name,Office,POSH,Cyber Security\n\
                     Ravi Kumar, Nellore ,1,\n\
                     Lakshmi,Tirupati,0,1\n";
        let table = parse_table(input.as_bytes()).unwrap();

        assert_eq!(table.headers, vec!["Name", "Office", "POSH", "Cyber Security"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 1), &Cell::Text("Nellore".to_string()));
        assert_eq!(table.cell(0, 2), &Cell::Number(1.0));
        assert_eq!(table.cell(0, 3), &Cell::Blank);
    }

    #[test]
    fn tolerates_short_rows_and_skips_empty_lines() {
        let input = "Name,Office,POSH\nRavi,Nellore\n,,\nLakshmi,Kavali,1\n";
        let table = parse_table(input.as_bytes()).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 2), &Cell::Blank);
        assert_eq!(table.cell(1, 2), &Cell::Number(1.0));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_table("".as_bytes()).is_err());
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Name,Office,POSH").unwrap();
        writeln!(file, "Ravi,Nellore,1").unwrap();

        let table = read_table(file.path()).unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_table(Path::new("/nonexistent/status.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/status.csv"));
    }
}
