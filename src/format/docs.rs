//! HTML documentation bundle formatter
//!
//! Emits a self-contained browsable bundle: `index.html`, `assets/styles.css`,
//! `assets/app.js`, and `assets/docs-data.js` carrying the full token model
//! as JSON under `window.__DTIFX_DOCS__`. Image tokens whose value names a
//! file relative to the configuration directory are copied into
//! `assets/media/` under a content-hash name.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::model::TokenType;

use super::{Artifact, Formatter, FormatterInput, FormatterSelector};

/// Well-known global the embedded data hangs off.
pub const DOCS_GLOBAL: &str = "__DTIFX_DOCS__";

pub struct HtmlDocsFormatter;

impl Formatter for HtmlDocsFormatter {
    fn name(&self) -> &'static str {
        "html-docs"
    }

    fn selector(&self) -> FormatterSelector {
        FormatterSelector::default()
    }

    fn run(&self, input: &FormatterInput) -> anyhow::Result<Vec<Artifact>> {
        let title = input
            .options
            .as_ref()
            .and_then(|o| o.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("Design Tokens");

        let mut artifacts = Vec::new();
        let mut media_index = Map::new();

        // Copy media first so the data payload can point at hashed paths.
        for token in &input.tokens {
            if token.snapshot.token_type != Some(TokenType::Image) {
                continue;
            }
            let Some(uri) = token.value.as_str() else {
                continue;
            };
            let Some(config_dir) = &input.config_dir else {
                continue;
            };
            let path = config_dir.join(uri);
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let digest = hex::encode(hasher.finalize());
            let extension = Path::new(uri)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin");
            let media_path = format!("assets/media/{}.{extension}", &digest[..16]);
            media_index.insert(token.pointer.clone(), json!(media_path));
            artifacts.push(Artifact::binary(media_path, bytes));
        }

        let mut tokens_payload = Vec::with_capacity(input.tokens.len());
        for token in &input.tokens {
            let mut entry = Map::new();
            entry.insert("pointer".to_string(), json!(token.pointer));
            if let Some(token_type) = token.snapshot.token_type {
                entry.insert("type".to_string(), json!(token_type.as_str()));
            }
            entry.insert("value".to_string(), token.value.clone());
            if let Some(description) = &token.snapshot.description {
                entry.insert("description".to_string(), json!(description));
            }
            entry.insert("layer".to_string(), json!(token.snapshot.provenance.layer));
            entry.insert(
                "source".to_string(),
                json!(token.snapshot.provenance.source_id),
            );
            if !token.snapshot.resolution_path.is_empty() {
                let trace: Vec<String> = token
                    .snapshot
                    .resolution_path
                    .iter()
                    .map(|step| format!("{}{}", step.uri, step.pointer))
                    .collect();
                entry.insert("resolutionPath".to_string(), json!(trace));
            }
            tokens_payload.push(Value::Object(entry));
        }

        let data = json!({
            "title": title,
            "tokens": tokens_payload,
            "media": Value::Object(media_index),
        });

        artifacts.push(Artifact::text(
            "assets/docs-data.js",
            format!(
                "window.{DOCS_GLOBAL} = {};\n",
                serde_json::to_string_pretty(&data)?
            ),
        ));
        artifacts.push(Artifact::text("assets/styles.css", STYLES_CSS.to_string()));
        artifacts.push(Artifact::text("assets/app.js", APP_JS.to_string()));
        artifacts.push(Artifact::text("index.html", index_html(title)));

        Ok(artifacts)
    }
}

fn index_html(title: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{title}</title>
    <link rel="stylesheet" href="assets/styles.css" />
  </head>
  <body>
    <header>
      <h1>{title}</h1>
      <input id="search" type="search" placeholder="Filter tokens…" />
    </header>
    <main id="tokens"></main>
    <script src="assets/docs-data.js"></script>
    <script src="assets/app.js"></script>
  </body>
</html>
"#
    )
}

const STYLES_CSS: &str = r#"* { box-sizing: border-box; }
body {
  margin: 0;
  font-family: system-ui, sans-serif;
  color: #1a1a2e;
  background: #f7f7fb;
}
header {
  display: flex;
  align-items: center;
  justify-content: space-between;
  padding: 1rem 2rem;
  background: #fff;
  border-bottom: 1px solid #e3e3ef;
}
header h1 { font-size: 1.25rem; margin: 0; }
#search {
  padding: 0.5rem 0.75rem;
  border: 1px solid #c9c9da;
  border-radius: 6px;
  min-width: 240px;
}
main { padding: 1.5rem 2rem; display: grid; gap: 0.5rem; }
.token {
  display: grid;
  grid-template-columns: 2rem 1fr auto;
  gap: 1rem;
  align-items: center;
  padding: 0.6rem 1rem;
  background: #fff;
  border: 1px solid #e3e3ef;
  border-radius: 8px;
}
.token .swatch {
  width: 1.5rem;
  height: 1.5rem;
  border-radius: 4px;
  border: 1px solid rgba(0, 0, 0, 0.1);
}
.token .pointer { font-family: ui-monospace, monospace; font-size: 0.85rem; }
.token .meta { color: #6b6b80; font-size: 0.8rem; }
.token .value { font-family: ui-monospace, monospace; font-size: 0.8rem; }
"#;

const APP_JS: &str = r#"(function () {
  "use strict";
  var data = window.__DTIFX_DOCS__ || { tokens: [] };
  var container = document.getElementById("tokens");
  var search = document.getElementById("search");

  function swatchColor(token) {
    if (token.type !== "color") return null;
    if (typeof token.value === "string") return token.value;
    if (token.value && Array.isArray(token.value.components)) {
      var c = token.value.components;
      return (
        "rgb(" +
        Math.round(c[0] * 255) + " " +
        Math.round(c[1] * 255) + " " +
        Math.round(c[2] * 255) + ")"
      );
    }
    return null;
  }

  function render(filter) {
    container.textContent = "";
    data.tokens
      .filter(function (token) {
        if (!filter) return true;
        return token.pointer.indexOf(filter) !== -1;
      })
      .forEach(function (token) {
        var row = document.createElement("div");
        row.className = "token";

        var swatch = document.createElement("div");
        swatch.className = "swatch";
        var color = swatchColor(token);
        if (color) swatch.style.background = color;
        row.appendChild(swatch);

        var label = document.createElement("div");
        var pointer = document.createElement("div");
        pointer.className = "pointer";
        pointer.textContent = token.pointer;
        label.appendChild(pointer);
        var meta = document.createElement("div");
        meta.className = "meta";
        meta.textContent =
          (token.type || "untyped") + " · " + token.layer + "/" + token.source;
        label.appendChild(meta);
        row.appendChild(label);

        var value = document.createElement("div");
        value.className = "value";
        value.textContent = JSON.stringify(token.value);
        row.appendChild(value);

        container.appendChild(row);
      });
  }

  search.addEventListener("input", function () {
    render(search.value.trim());
  });
  render("");
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ArtifactContents, FormatterToken};
    use crate::model::{JsonPointer, Provenance, TokenSnapshot};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn token(pointer: &str, token_type: Option<TokenType>, value: Value) -> FormatterToken {
        let mut snapshot = TokenSnapshot::parsed(
            JsonPointer::parse(pointer),
            value.clone(),
            Provenance {
                source_id: "base-tokens".into(),
                layer: "base".into(),
                layer_index: 0,
                uri: "t.json".into(),
                pointer_prefix: JsonPointer::root(),
            },
        );
        snapshot.token_type = token_type;
        FormatterToken {
            pointer: pointer.to_string(),
            value,
            raw: json!({}),
            metadata: None,
            transforms: BTreeMap::new(),
            snapshot,
        }
    }

    #[test]
    fn bundle_contains_the_four_core_files() {
        let input = FormatterInput {
            tokens: vec![token(
                "#/color/primary",
                Some(TokenType::Color),
                json!("#336699"),
            )],
            options: None,
            instance_id: "docs#0".into(),
            config_dir: None,
        };
        let artifacts = HtmlDocsFormatter.run(&input).unwrap();
        let paths: Vec<&str> = artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "assets/docs-data.js",
                "assets/styles.css",
                "assets/app.js",
                "index.html"
            ]
        );
    }

    #[test]
    fn data_payload_embeds_the_model_under_the_global() {
        let input = FormatterInput {
            tokens: vec![token(
                "#/color/primary",
                Some(TokenType::Color),
                json!("#336699"),
            )],
            options: Some(json!({"title": "Brand Tokens"})),
            instance_id: "docs#0".into(),
            config_dir: None,
        };
        let artifacts = HtmlDocsFormatter.run(&input).unwrap();
        let data = match &artifacts[0].contents {
            ArtifactContents::Text(text) => text.clone(),
            _ => panic!("expected text artifact"),
        };
        assert!(data.starts_with("window.__DTIFX_DOCS__ = {"));
        assert!(data.contains("\"#/color/primary\""));
        assert!(data.contains("Brand Tokens"));
    }

    #[test]
    fn image_tokens_are_copied_by_content_hash() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("logo.svg"), b"<svg/>").unwrap();

        let input = FormatterInput {
            tokens: vec![token(
                "#/brand/logo",
                Some(TokenType::Image),
                json!("logo.svg"),
            )],
            options: None,
            instance_id: "docs#0".into(),
            config_dir: Some(dir.path().to_path_buf()),
        };
        let artifacts = HtmlDocsFormatter.run(&input).unwrap();
        let media: Vec<&Artifact> = artifacts
            .iter()
            .filter(|a| a.path.starts_with("assets/media/"))
            .collect();
        assert_eq!(media.len(), 1);
        assert!(media[0].path.ends_with(".svg"));
        assert_eq!(media[0].contents.as_bytes(), b"<svg/>");
    }
}
