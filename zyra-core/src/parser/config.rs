use crate::{config::Config, model::split_lines};

use super::{section_name, Cursor, ParseError};

/// Parse a `zyra.config` file: `[context]`, `[options]` and `[assert]` sections.
pub fn parse_config(src: &str) -> Result<Config, ParseError> {
    let lines = split_lines(src);
    let mut cursor = Cursor::new(&lines);
    let mut cfg = Config::default();

    while let Some(line) = cursor.current() {
        let text = line.text.trim();

        if text.is_empty() || text.starts_with('#') {
            cursor.advance();
            continue;
        }
        let Some(section) = section_name(text) else {
            return Err(ParseError::new(
                line.num,
                format!("unexpected content: `{text}`"),
            ));
        };
        cursor.advance();

        match section.as_str() {
            "context" => cursor.key_values(&mut cfg.context)?,
            "options" => cursor.key_values(&mut cfg.options.values)?,
            "assert" => cursor.assertions(&mut cfg.assertions)?,
            _ => {
                return Err(ParseError::new(
                    line.num,
                    format!("unknown section: {section}"),
                ))
            }
        }
    }

    Ok(cfg)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_all_sections() {
        let cfg = parse_config(
            "# project config\n[context]\nbase = http://localhost\ntoken = abc\n\n[options]\nbase_url = http://localhost:8080\ntimeout = 5000\n\n[assert]\nres.status lt 500\n",
        )
        .unwrap();

        assert_eq!(cfg.context["base"], "http://localhost");
        assert_eq!(cfg.context["token"], "abc");
        assert_eq!(cfg.options.get_str("base_url").unwrap(), "http://localhost:8080");
        assert_eq!(cfg.options.get_int("timeout").unwrap(), 5000);
        assert_eq!(cfg.assertions.len(), 1);
        assert_eq!(cfg.assertions[0].line, 11);
        assert_eq!(cfg.assertions[0].function, "lt");
    }

    #[test]
    fn empty_config() {
        let cfg = parse_config("").unwrap();
        assert!(cfg.context.is_empty());
        assert!(cfg.assertions.is_empty());
    }

    #[test]
    fn reject_document_sections() {
        let err = parse_config("[headers]\nA = 1\n").unwrap_err();
        assert_eq!(err, ParseError::new(1, "unknown section: headers"));
    }

    #[test]
    fn reject_stray_content() {
        let err = parse_config("[context]\na = 1\n\nGET /x\n").unwrap_err();
        assert_eq!(err, ParseError::new(4, "expected key = value"));
    }
}
