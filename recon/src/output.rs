use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ErrorKind, ReconResult};
use crate::recon_error;
use crate::types::JoinedRow;

/// Header line of every reconciliation output.
pub const OUTPUT_HEADER: &str = r#""Id","CreatedById""#;

/// Returns the path of the output written for `dataset` in `directory`.
pub fn output_path(directory: &Path, dataset: &str) -> PathBuf {
    directory.join(format!("{dataset}.csv"))
}

/// Renders `rows` below [`OUTPUT_HEADER`].
///
/// Ids and owners are quoted. A row without an owner gets `missing_owner` verbatim instead.
/// Lines are separated by `\n`, without a terminator after the last one.
pub fn render(rows: &[JoinedRow], missing_owner: &str) -> String {
    let mut output = String::from(OUTPUT_HEADER);

    for row in rows {
        output.push('\n');
        push_quoted(&mut output, &row.id);
        output.push(',');
        match &row.created_by {
            Some(owner) => push_quoted(&mut output, owner),
            None => output.push_str(missing_owner),
        }
    }

    output
}

fn push_quoted(output: &mut String, value: &str) {
    output.push('"');
    for c in value.chars() {
        if c == '"' {
            output.push('"');
        }
        output.push(c);
    }
    output.push('"');
}

/// Writes the rendered `rows` to `path`, replacing any existing file.
pub async fn write_output(path: &Path, rows: &[JoinedRow], missing_owner: &str) -> ReconResult<()> {
    let contents = render(rows, missing_owner);

    tokio::fs::write(path, contents.as_bytes())
        .await
        .map_err(|err| {
            recon_error!(
                ErrorKind::OutputWriteFailed,
                "Reconciliation output could not be written",
                format!("{}: {err}", path.display()),
                source: err
            )
        })?;

    info!(path = %path.display(), rows = rows.len(), "reconciliation output written");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, created_by: Option<&str>) -> JoinedRow {
        JoinedRow {
            id: id.to_string(),
            created_by: created_by.map(str::to_string),
        }
    }

    #[test]
    fn renders_header_and_rows_without_trailing_newline() {
        let rendered = render(
            &[row("m1", Some("u1")), row("m2", None), row("m\"3", Some(""))],
            "undefined",
        );

        insta::assert_snapshot!(rendered, @r#"
        "Id","CreatedById"
        "m1","u1"
        "m2",undefined
        "m""3",""
        "#);
        assert!(!rendered.ends_with('\n'));
    }

    #[test]
    fn empty_placeholder_leaves_the_owner_field_empty() {
        assert_eq!(
            render(&[row("m1", None)], ""),
            "\"Id\",\"CreatedById\"\n\"m1\","
        );
    }

    #[test]
    fn no_rows_renders_only_the_header() {
        assert_eq!(render(&[], "undefined"), OUTPUT_HEADER);
    }

    #[test]
    fn output_is_named_after_the_dataset() {
        assert_eq!(
            output_path(Path::new("/tmp/out"), "cgcloud__Fund__c"),
            PathBuf::from("/tmp/out/cgcloud__Fund__c.csv")
        );
    }

    #[tokio::test]
    async fn write_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");

        let err = write_output(&path, &[row("m1", None)], "undefined")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OutputWriteFailed);
    }

    #[tokio::test]
    async fn writes_rendered_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "Data__c");

        write_output(&path, &[row("m1", Some("u1"))], "undefined")
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "\"Id\",\"CreatedById\"\n\"m1\",\"u1\""
        );
    }
}
