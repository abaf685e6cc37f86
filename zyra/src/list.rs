use console::Term;
use eyre::WrapErr;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style};
use zyra_core::{loader, Document, Method};

/// Metadata of one request file, as printed by `zyra list --json`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub file_path: String,
    pub method: Method,
    pub url: String,
    pub assertions: usize,
    pub has_headers: bool,
    pub has_vars: bool,
    pub has_body: bool,
}

impl RequestMeta {
    fn new(file: &Path, doc: &Document) -> RequestMeta {
        RequestMeta {
            file_path: file.display().to_string(),
            method: doc.method,
            url: doc.path.clone(),
            assertions: doc.assertions.len(),
            has_headers: !doc.headers.is_empty(),
            has_vars: !doc.vars.is_empty(),
            has_body: doc.has_body(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub count: bool,
    pub json: bool,
    pub absolute: bool,
    /// Keep files whose path or request path contains this text.
    pub pattern: Option<String>,
}

/// Parse every request file under `path` and collect the ones matching `options`.
pub fn collect(path: &Path, options: &ListOptions) -> eyre::Result<Vec<RequestMeta>> {
    let mut metas = Vec::new();
    for file in loader::discover(path)? {
        let doc = loader::load_document(&file)?;
        let file = if options.absolute {
            std::fs::canonicalize(&file)
                .wrap_err_with(|| format!("failed to resolve {}", file.display()))?
        } else {
            file
        };
        let meta = RequestMeta::new(&file, &doc);
        if let Some(pattern) = &options.pattern {
            if !meta.file_path.contains(pattern.as_str()) && !meta.url.contains(pattern.as_str()) {
                continue;
            }
        }
        metas.push(meta);
    }
    Ok(metas)
}

pub fn run(path: PathBuf, options: ListOptions) -> eyre::Result<()> {
    let term = Term::stdout();
    let metas = collect(&path, &options)?;

    if options.count {
        term.write_line(&format!("Requests: {}", metas.len()))?;
    } else if options.json {
        term.write_line(&serde_json::to_string_pretty(&metas)?)?;
    } else if metas.is_empty() {
        term.write_line("no request files found")?;
    } else {
        term.write_line(&render_table(&metas))?;
    }
    Ok(())
}

fn render_table(metas: &[RequestMeta]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Method", "URL", "File", "Assertions"]);
    for meta in metas {
        builder.push_record([
            meta.method.to_string(),
            meta.url.clone(),
            meta.file_path.clone(),
            meta.assertions.to_string(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    fn demos() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos")
    }

    #[test]
    fn collect_demos() -> eyre::Result<()> {
        let metas = collect(&demos(), &ListOptions::default())?;
        assert!(!metas.is_empty());
        assert!(metas.iter().all(|m| m.file_path.ends_with(".zyra")));
        Ok(())
    }

    #[test]
    fn pattern_filters_by_request_path() -> eyre::Result<()> {
        let options = ListOptions {
            pattern: Some("/post".into()),
            ..Default::default()
        };
        let metas = collect(&demos(), &options)?;
        assert!(metas.iter().all(|m| m.url.contains("/post") || m.file_path.contains("/post")));
        assert!(metas.iter().any(|m| m.method == Method::Post));
        Ok(())
    }

    #[test]
    fn json_field_names() -> eyre::Result<()> {
        let meta = RequestMeta {
            file_path: "a.zyra".into(),
            method: Method::Get,
            url: "/users".into(),
            assertions: 2,
            has_headers: true,
            has_vars: false,
            has_body: false,
        };
        assert_eq!(
            serde_json::to_value(&meta)?,
            serde_json::json!({
                "filePath": "a.zyra",
                "method": "GET",
                "url": "/users",
                "assertions": 2,
                "hasHeaders": true,
                "hasVars": false,
                "hasBody": false
            })
        );
        Ok(())
    }
}
