// ABOUTME: HTML rendering module for the hero-panel application
// ABOUTME: Lays out image layers, the scrim and foreground content as HTML

use crate::errors::{PanelError, Result};
use crate::panel::PanelSnapshot;
use log::info;
use std::fs;
use std::path::Path;

/// Presentation settings for the panel markup
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub fade_duration_ms: u64,
    pub scrim_color: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fade_duration_ms: 1000,
            // slate-900 at 70%
            scrim_color: "rgba(15, 23, 42, 0.7)".to_string(),
        }
    }
}

/// Settings for a page that follows the live panel
#[derive(Debug, Clone, PartialEq)]
pub struct LiveUpdate {
    pub snapshot_url: String,
    pub poll_interval_ms: u64,
}

/// Render the panel: one layer per image, then the scrim, then the
/// foreground. `foreground` is inserted as-is.
pub fn render_panel(snapshot: &PanelSnapshot, foreground: &str, options: &RenderOptions) -> String {
    let mut html = String::from(
        "<div class=\"hero-panel\" style=\"position: absolute; inset: 0; z-index: 0;\">\n",
    );

    if snapshot.layers.is_empty() {
        // Fallback: no image layers at all
        html.push_str(&format!(
            "  <div class=\"hero-scrim\" style=\"position: absolute; inset: 0; background-color: {};\"></div>\n",
            escape_attr(&options.scrim_color)
        ));
        html.push_str(&format!(
            "  <div class=\"hero-foreground\" style=\"position: absolute; inset: 0; z-index: 10;\">{}</div>\n",
            foreground
        ));
        html.push_str("</div>");
        return html;
    }

    for layer in &snapshot.layers {
        html.push_str(&format!(
            "  <div class=\"hero-layer\" data-index=\"{index}\" style=\"position: absolute; inset: 0; width: 100%; height: 100%; \
background-image: url('{src}'); background-size: cover; background-position: center; \
transition: opacity {fade}ms ease-in-out; opacity: {opacity}; z-index: {z};\"></div>\n",
            index = layer.index,
            src = escape_attr(&escape_css_url(&layer.src)),
            fade = options.fade_duration_ms,
            opacity = layer.opacity,
            z = layer.z_index,
        ));
    }

    html.push_str(&format!(
        "  <div class=\"hero-scrim\" style=\"position: absolute; inset: 0; background-color: {}; z-index: 2;\"></div>\n",
        escape_attr(&options.scrim_color)
    ));
    html.push_str(&format!(
        "  <div class=\"hero-foreground\" style=\"position: absolute; inset: 0; z-index: 3;\">{}</div>\n",
        foreground
    ));
    html.push_str("</div>");
    html
}

/// Build a complete HTML document around the panel
pub fn generate_page(
    snapshot: &PanelSnapshot,
    title: &str,
    foreground: &str,
    options: &RenderOptions,
    live: Option<&LiveUpdate>,
) -> String {
    info!(
        "Generating page with {} image layers (generation {})",
        snapshot.layers.len(),
        snapshot.generation
    );

    let mut html_doc = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html_doc.push_str("<meta charset=\"UTF-8\">\n");
    html_doc.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html_doc.push_str(&format!("<title>{}</title>\n", escape_text(title)));
    html_doc.push_str("<style>html, body { margin: 0; height: 100%; } .hero { position: relative; height: 100vh; overflow: hidden; }</style>\n");
    html_doc.push_str("</head>\n<body>\n<section class=\"hero\">\n");
    html_doc.push_str(&render_panel(snapshot, foreground, options));
    html_doc.push_str("\n</section>\n");

    if let Some(live) = live {
        html_doc.push_str(&live_script(snapshot.generation, live));
        html_doc.push('\n');
    }

    html_doc.push_str("</body>\n</html>");
    html_doc
}

/// Polls the snapshot endpoint and applies layer opacity; reloads when
/// the image set changes
fn live_script(generation: u64, live: &LiveUpdate) -> String {
    format!(
        r#"<script>
(function () {{
  var generation = {generation};
  function apply(snapshot) {{
    if (snapshot.generation !== generation) {{
      window.location.reload();
      return;
    }}
    snapshot.layers.forEach(function (layer) {{
      var el = document.querySelector('.hero-layer[data-index="' + layer.index + '"]');
      if (el) {{
        el.style.opacity = layer.opacity;
        el.style.zIndex = layer.z_index;
      }}
    }});
  }}
  setInterval(function () {{
    fetch('{url}').then(function (r) {{ return r.json(); }}).then(apply).catch(function () {{}});
  }}, {poll});
}})();
</script>"#,
        generation = generation,
        url = live.snapshot_url.replace('\'', "\\'"),
        poll = live.poll_interval_ms,
    )
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn escape_css_url(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Utility function to write HTML content to a file
pub fn write_html_to_file(html_content: &str, output_path: &Path) -> Result<()> {
    info!("Writing HTML to file: {:?}", output_path);

    // Ensure parent directory exists
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(PanelError::FileReadError)?;
        }
    }

    fs::write(output_path, html_content).map_err(PanelError::FileReadError)?;

    Ok(())
}
