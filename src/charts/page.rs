//! Map Page Writer
//! Wraps a Plotly figure in a standalone HTML page.

use crate::charts::figure::FigureError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

const PLOTLY_SCRIPT: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

pub struct MapPage;

impl MapPage {
    /// Render the HTML document for a figure.
    pub fn render_html(title: &str, figure: &Value) -> Result<String, FigureError> {
        // "</" inside the JSON would close the script element early.
        let figure_json = serde_json::to_string(figure)?.replace("</", "<\\/");
        let title = Self::escape_html(title);

        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_SCRIPT}"></script>
</head>
<body>
<h1>{title}</h1>
<div id="map"></div>
<script>
const figure = {figure_json};
Plotly.newPlot("map", figure.data, figure.layout).then(function () {{
  return Plotly.addFrames("map", figure.frames);
}});
</script>
</body>
</html>
"#
        ))
    }

    /// Write `<output_dir>/<file_stem>.html` and return its path.
    pub fn write(
        output_dir: &Path,
        file_stem: &str,
        title: &str,
        figure: &Value,
    ) -> Result<PathBuf, FigureError> {
        let html = Self::render_html(title, figure)?;
        std::fs::create_dir_all(output_dir).map_err(|source| FigureError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let path = output_dir.join(format!("{file_stem}.html"));
        std::fs::write(&path, html).map_err(|source| FigureError::Io {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "Wrote map page");
        Ok(path)
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn html_embeds_figure_and_escapes_title() {
        let figure = json!({ "data": [], "layout": { "title": "</script>" }, "frames": [] });
        let html = MapPage::render_html("Views & <Visits>", &figure).unwrap();

        assert!(html.contains("<title>Views &amp; &lt;Visits&gt;</title>"));
        assert!(html.contains(PLOTLY_SCRIPT));
        assert!(html.contains("<\\/script>"));
        assert!(html.contains("Plotly.addFrames"));
    }

    #[test]
    fn write_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("maps");

        let path = MapPage::write(&out, "bubble_population", "Map", &json!({})).unwrap();
        assert_eq!(path, out.join("bubble_population.html"));
        assert!(std::fs::read_to_string(path).unwrap().contains("const figure = {}"));
    }
}
