//! Per-construct metrics as presentation tables: Markdown, LaTeX, SVG.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use concord_recon::scoring::ConstructMetrics;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::IoError;

pub const COLUMNS: [&str; 5] = [
    "construct",
    "freq_in_data",
    "hum_model_kappa",
    "hum_model_precision",
    "hum_model_recall",
];

const MISSING: &str = "n/a";

/// One formatted table row, in [`COLUMNS`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow(pub [String; 5]);

// ---------------------------------------------------------------------------
// Loading & formatting
// ---------------------------------------------------------------------------

/// Read per-construct records from `.json` or `.csv`.
pub fn load_records(path: &Path) -> Result<Vec<ConstructMetrics>, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => {
            let file = File::open(path).map_err(|e| IoError::open(path, e))?;
            serde_json::from_reader(BufReader::new(file)).map_err(|e| IoError::json(path, e))
        }
        Some("csv") => {
            let mut reader = csv::Reader::from_path(path).map_err(|e| IoError::csv(path, e))?;
            reader
                .deserialize()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| IoError::csv(path, e))
        }
        _ => Err(IoError::Unsupported {
            path: path.display().to_string(),
            expected: ".csv or .json",
        }),
    }
}

/// Whole percent, halves rounded to even (0.125 → 12%).
fn percent(v: Option<f64>) -> String {
    match v {
        Some(f) if f.is_finite() => format!("{}%", (f * 100.0).round_ties_even() as i64),
        _ => MISSING.to_string(),
    }
}

fn two_places(v: Option<f64>) -> String {
    match v {
        Some(f) if f.is_finite() => format!("{f:.2}"),
        _ => MISSING.to_string(),
    }
}

/// Frequency as a whole percent, statistics to two decimals, `n_eval` dropped.
pub fn pretty(records: &[ConstructMetrics]) -> Vec<DisplayRow> {
    records
        .iter()
        .map(|r| {
            DisplayRow([
                r.construct.clone(),
                percent(r.freq_in_data),
                two_places(r.hum_model_kappa),
                two_places(r.hum_model_precision),
                two_places(r.hum_model_recall),
            ])
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

pub fn markdown(rows: &[DisplayRow]) -> String {
    let cell = |s: &str| s.replace('|', "\\|").replace('\n', " ");
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", COLUMNS.join(" | ")));
    out.push_str(&format!("|{}\n", ":---|".repeat(COLUMNS.len())));
    for DisplayRow(cells) in rows {
        let cells: Vec<String> = cells.iter().map(|c| cell(c)).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

// ---------------------------------------------------------------------------
// LaTeX
// ---------------------------------------------------------------------------

pub fn latex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// A `longtable` with booktabs rules, header repeated on every page.
pub fn latex(rows: &[DisplayRow]) -> String {
    let header = COLUMNS.map(latex_escape).join(" & ");
    let n = COLUMNS.len();

    let mut out = String::new();
    out.push_str(&format!("\\begin{{longtable}}{{{}}}\n", "l".repeat(n)));
    out.push_str(&format!("\\toprule\n{header} \\\\\n\\midrule\n\\endfirsthead\n"));
    out.push_str(&format!("\\toprule\n{header} \\\\\n\\midrule\n\\endhead\n"));
    out.push_str(&format!(
        "\\midrule\n\\multicolumn{{{n}}}{{r}}{{Continued on next page}} \\\\\n\\midrule\n\\endfoot\n"
    ));
    out.push_str("\\bottomrule\n\\endlastfoot\n");
    for DisplayRow(cells) in rows {
        let escaped: Vec<String> = cells.iter().map(|c| latex_escape(c)).collect();
        out.push_str(&format!("{} \\\\\n", escaped.join(" & ")));
    }
    out.push_str("\\end{longtable}\n");
    out
}

// ---------------------------------------------------------------------------
// SVG
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SvgOptions {
    pub title: Option<String>,
    /// Wrap width for the construct column, in characters.
    pub wrap: usize,
    pub font_size: u32,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            title: None,
            wrap: 16,
            font_size: 9,
        }
    }
}

/// Greedy word wrap; words longer than `width` stay whole.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

fn xml_err(e: impl ToString) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

/// Table image with a bold header row and wrapped construct names.
pub fn svg(rows: &[DisplayRow], options: &SvgOptions) -> Result<String, std::io::Error> {
    let font = options.font_size.max(1) as f64;
    let char_w = font * 0.62;
    let line_h = font * 1.4;
    let pad = font * 0.8;

    let wrapped: Vec<Vec<String>> = rows
        .iter()
        .map(|DisplayRow(c)| wrap_words(&c[0], options.wrap.max(1)))
        .collect();

    // Column widths from the longest line in each column.
    let mut widths = [0usize; 5];
    for (i, h) in COLUMNS.iter().enumerate() {
        widths[i] = h.chars().count();
    }
    for (DisplayRow(cells), lines) in rows.iter().zip(&wrapped) {
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        widths[0] = widths[0].max(longest);
        for i in 1..5 {
            widths[i] = widths[i].max(cells[i].chars().count());
        }
    }
    let col_px: Vec<f64> = widths.iter().map(|w| *w as f64 * char_w + 2.0 * pad).collect();
    let table_w: f64 = col_px.iter().sum();

    let title_h = if options.title.is_some() { line_h * 2.0 } else { 0.0 };
    let header_h = line_h + pad;
    let row_h: Vec<f64> = wrapped.iter().map(|l| l.len() as f64 * line_h + pad).collect();
    let total_w = table_w + 2.0 * pad;
    let total_h = title_h + header_h + row_h.iter().sum::<f64>() + 2.0 * pad;

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let (w, h) = (format!("{total_w:.1}"), format!("{total_h:.1}"));
    let view_box = format!("0 0 {w} {h}");
    let font_attr = format!("{font}");
    writer
        .write_event(Event::Start(BytesStart::new("svg").with_attributes([
            ("xmlns", "http://www.w3.org/2000/svg"),
            ("width", w.as_str()),
            ("height", h.as_str()),
            ("viewBox", view_box.as_str()),
            ("font-family", "Helvetica, Arial, sans-serif"),
            ("font-size", font_attr.as_str()),
        ])))
        .map_err(xml_err)?;

    let empty = |writer: &mut Writer<Vec<u8>>, name: &str, attrs: &[(&str, String)]| {
        let elem = BytesStart::new(name).with_attributes(attrs.iter().map(|(k, v)| (*k, v.as_str())));
        writer.write_event(Event::Empty(elem)).map_err(xml_err)
    };
    let text = |writer: &mut Writer<Vec<u8>>, x: f64, y: f64, content: &str, bold: bool| {
        let (xs, ys) = (format!("{x:.1}"), format!("{y:.1}"));
        let mut elem = BytesStart::new("text").with_attributes([("x", xs.as_str()), ("y", ys.as_str())]);
        if bold {
            elem.push_attribute(("font-weight", "bold"));
        }
        writer.write_event(Event::Start(elem)).map_err(xml_err)?;
        writer
            .write_event(Event::Text(BytesText::new(content)))
            .map_err(xml_err)?;
        writer.write_event(Event::End(BytesEnd::new("text"))).map_err(xml_err)
    };

    empty(
        &mut writer,
        "rect",
        &[
            ("width", w.clone()),
            ("height", h.clone()),
            ("fill", "white".into()),
        ],
    )?;

    if let Some(title) = &options.title {
        let mut elem = BytesStart::new("text");
        let x = format!("{:.1}", total_w / 2.0);
        let y = format!("{:.1}", pad + line_h);
        let size = format!("{:.1}", font * 1.2);
        elem.push_attribute(("x", x.as_str()));
        elem.push_attribute(("y", y.as_str()));
        elem.push_attribute(("text-anchor", "middle"));
        elem.push_attribute(("font-size", size.as_str()));
        writer.write_event(Event::Start(elem)).map_err(xml_err)?;
        writer
            .write_event(Event::Text(BytesText::new(title)))
            .map_err(xml_err)?;
        writer.write_event(Event::End(BytesEnd::new("text"))).map_err(xml_err)?;
    }

    let left = pad;
    let mut top = pad + title_h;

    // Header
    let mut x = left;
    for (i, name) in COLUMNS.iter().enumerate() {
        text(&mut writer, x + pad, top + line_h, name, true)?;
        x += col_px[i];
    }
    top += header_h;
    let rule = |y: f64| {
        vec![
            ("x1", format!("{left:.1}")),
            ("x2", format!("{:.1}", left + table_w)),
            ("y1", format!("{y:.1}")),
            ("y2", format!("{y:.1}")),
            ("stroke", "black".to_string()),
            ("stroke-width", "0.6".to_string()),
        ]
    };
    empty(&mut writer, "line", &rule(pad + title_h))?;
    empty(&mut writer, "line", &rule(top))?;

    // Body
    for ((DisplayRow(cells), lines), height) in rows.iter().zip(&wrapped).zip(&row_h) {
        let mut x = left;
        for (j, line) in lines.iter().enumerate() {
            text(&mut writer, x + pad, top + line_h * (j as f64 + 1.0), line, false)?;
        }
        x += col_px[0];
        for i in 1..5 {
            text(&mut writer, x + pad, top + line_h, &cells[i], false)?;
            x += col_px[i];
        }
        top += height;
        empty(&mut writer, "line", &rule(top))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("svg")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPaths {
    pub markdown: PathBuf,
    pub latex: PathBuf,
    pub svg: PathBuf,
}

impl RenderPaths {
    /// `<input stem>.md`, `.tex`, `.svg` next to the input.
    pub fn beside(input: &Path) -> Self {
        Self {
            markdown: input.with_extension("md"),
            latex: input.with_extension("tex"),
            svg: input.with_extension("svg"),
        }
    }
}

/// Load `input` and write all three renderings. Returns the number of rows.
pub fn render_files(input: &Path, out: &RenderPaths, options: &SvgOptions) -> Result<usize, IoError> {
    let records = load_records(input)?;
    let rows = pretty(&records);

    let write = |path: &Path, content: String| {
        std::fs::write(path, content).map_err(|e| IoError::write(path, e))
    };
    write(&out.markdown, markdown(&rows))?;
    write(&out.latex, latex(&rows))?;
    let image = svg(&rows, options).map_err(|e| IoError::write(&out.svg, e))?;
    write(&out.svg, image)?;

    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn records() -> Vec<ConstructMetrics> {
        vec![
            ConstructMetrics {
                construct: "Variable Usage & Assignment".into(),
                freq_in_data: Some(0.125),
                hum_model_kappa: Some(0.4567),
                hum_model_precision: Some(1.0),
                hum_model_recall: Some(0.5),
                n_eval: 8,
            },
            ConstructMetrics::new("Operator".into(), None),
        ]
    }

    #[test]
    fn pretty_formats_values() {
        let rows = pretty(&records());
        assert_eq!(
            rows[0].0,
            [
                "Variable Usage & Assignment".to_string(),
                "12%".into(),
                "0.46".into(),
                "1.00".into(),
                "0.50".into(),
            ]
        );
        assert_eq!(rows[1].0[1], "n/a");
        assert_eq!(rows[1].0[2], "n/a");
    }

    #[test]
    fn percent_rounds_halves_to_even() {
        assert_eq!(percent(Some(0.125)), "12%");
        assert_eq!(percent(Some(0.375)), "38%");
        assert_eq!(percent(Some(0.5)), "50%");
        assert_eq!(percent(Some(0.126)), "13%");
        assert_eq!(percent(None), "n/a");
    }

    #[test]
    fn markdown_table() {
        let md = markdown(&pretty(&records()));
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(
            lines[0],
            "| construct | freq_in_data | hum_model_kappa | hum_model_precision | hum_model_recall |"
        );
        assert_eq!(lines[1], "|:---|:---|:---|:---|:---|");
        assert_eq!(lines[3], "| Operator | n/a | n/a | n/a | n/a |");
        assert!(!md.contains("n_eval"));
    }

    #[test]
    fn latex_escapes_and_uses_longtable() {
        let tex = latex(&pretty(&records()));
        assert!(tex.starts_with("\\begin{longtable}{lllll}"));
        assert!(tex.contains("freq\\_in\\_data"));
        assert!(tex.contains("Variable Usage \\& Assignment & 13\\% & 0.46"));
        assert!(tex.trim_end().ends_with("\\end{longtable}"));
    }

    #[test]
    fn wrapping_keeps_long_words() {
        assert_eq!(
            wrap_words("Variable-type Conversion Change", 16),
            vec!["Variable-type", "Conversion", "Change"]
        );
        assert_eq!(wrap_words("If Header", 16), vec!["If Header"]);
        assert_eq!(wrap_words("Supercalifragilistic", 5), vec!["Supercalifragilistic"]);
        assert_eq!(wrap_words("", 5), vec![""]);
    }

    #[test]
    fn svg_has_bold_header_and_title() {
        let opts = SvgOptions {
            title: Some("Construct <Metrics>".into()),
            ..SvgOptions::default()
        };
        let image = svg(&pretty(&records()), &opts).unwrap();
        assert!(image.contains("<svg"));
        assert!(image.contains(r#"font-weight="bold""#));
        assert!(image.contains("Construct &lt;Metrics&gt;"));
        assert!(image.contains("Variable Usage &amp;"));
        assert!(image.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn render_from_json_and_csv() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("per_construct.json");
        std::fs::write(
            &json,
            r#"[{"construct": "Comment", "freq_in_data": 0.5, "hum_gpt_kappa": null,
                 "hum_gpt_precision": 1.0, "hum_gpt_recall": 0.5, "n_eval": 4}]"#,
        )
        .unwrap();
        let out = RenderPaths::beside(&json);
        assert_eq!(render_files(&json, &out, &SvgOptions::default()).unwrap(), 1);
        let md = std::fs::read_to_string(&out.markdown).unwrap();
        assert!(md.contains("| Comment | 50% | n/a | 1.00 | 0.50 |"));
        assert!(out.latex.exists() && out.svg.exists());

        let csv = dir.path().join("per_construct.csv");
        std::fs::write(
            &csv,
            "construct,freq_in_data,hum_model_kappa,hum_model_precision,hum_model_recall,n_eval\nComment,0.5,,1.0,0.5,4\n",
        )
        .unwrap();
        let recs = load_records(&csv).unwrap();
        assert_eq!(recs[0].hum_model_kappa, None);
        assert_eq!(recs[0].n_eval, 4);
    }

    #[test]
    fn unsupported_extension() {
        let err = load_records(Path::new("metrics.xlsx")).unwrap_err();
        assert!(matches!(err, IoError::Unsupported { .. }));
    }
}
