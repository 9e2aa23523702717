use std::fmt::Write as _;
use std::path::Path;

use bibcheck_core::entry::BibEntry;
use bibcheck_core::schema::TypeSchema;

use crate::BibError;

/// Serialize one entry.
///
/// Fields of a recognized type are written in schema order (required, then
/// optional, then the rest in their existing order). Unrecognized types keep
/// their field order as is. Names are padded so values line up.
pub fn write_entry(entry: &BibEntry) -> String {
    let mut fields: Vec<&(String, String)> = entry.fields().iter().collect();
    if let Some(schema) = TypeSchema::for_type(entry.entry_type()) {
        // Stable sort keeps the relative order of equally-ranked fields.
        fields.sort_by_key(|(name, _)| schema.rank(name));
    }

    let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let mut out = String::new();
    let _ = writeln!(out, "@{}{{{},", entry.entry_type().bibtex_name(), entry.key());
    for (i, (name, value)) in fields.iter().enumerate() {
        let sep = if i + 1 == fields.len() { "" } else { "," };
        let _ = writeln!(out, "  {:<width$} = {{{}}}{}", name, value, sep, width = width);
    }
    out.push('}');
    out.push('\n');
    out
}

/// Serialize entries in order, separated by blank lines.
pub fn write_bibliography(entries: &[BibEntry]) -> String {
    entries
        .iter()
        .map(write_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_file(path: &Path, entries: &[BibEntry]) -> Result<(), BibError> {
    std::fs::write(path, write_bibliography(entries))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_bibliography;
    use bibcheck_core::entry::EntryType;

    #[test]
    fn canonical_field_order() {
        let entry = BibEntry::new(EntryType::InProceedings, "foo2020")
            .with_field("url", "https://x")
            .with_field("pages", "1--2")
            .with_field("keywords", "a")
            .with_field("title", "T")
            .with_field("abstract", "b")
            .with_field("booktitle", "NeurIPS")
            .with_field("author", "A B")
            .with_field("year", "2017");
        let text = write_entry(&entry);
        let expected = "@inproceedings{foo2020,\n  \
                        title     = {T},\n  \
                        author    = {A B},\n  \
                        booktitle = {NeurIPS},\n  \
                        year      = {2017},\n  \
                        pages     = {1--2},\n  \
                        url       = {https://x},\n  \
                        keywords  = {a},\n  \
                        abstract  = {b}\n\
                        }\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn unrecognized_types_keep_order_and_tag() {
        let entry = BibEntry::new(EntryType::Other("book".into()), "knuth")
            .with_field("year", "1968")
            .with_field("title", "TAOCP");
        assert_eq!(
            write_entry(&entry),
            "@book{knuth,\n  year  = {1968},\n  title = {TAOCP}\n}\n"
        );
    }

    #[test]
    fn written_output_parses_back() {
        let entries = vec![
            BibEntry::new(EntryType::Article, "a")
                .with_field("title", "{RoFormer}: Enhanced Transformer")
                .with_field("author", "Jianlin Su")
                .with_field("journal", "Neurocomputing")
                .with_field("year", "2024"),
            BibEntry::new(EntryType::Preprint("misc".into()), "b")
                .with_field("title", "A Preprint")
                .with_field("eprint", "2401.00001"),
        ];
        let text = write_bibliography(&entries);
        let parsed = parse_bibliography(&text).unwrap();
        assert!(parsed.failures.is_empty());
        assert_eq!(parsed.entries, entries);
    }

    #[test]
    fn write_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bib");
        let entry = BibEntry::new(EntryType::Article, "k").with_field("title", "T");
        write_file(&path, &[entry]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("@article{k,"));
    }
}
