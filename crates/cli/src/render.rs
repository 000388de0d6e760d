//! `concord render`: per-construct metrics as Markdown, LaTeX and SVG tables.

use std::path::PathBuf;

use clap::Args;
use concord_io::render::{render_files, RenderPaths, SvgOptions};

use crate::exit_codes::io_exit_code;
use crate::CliError;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Per-construct metrics (.json or .csv)
    pub input: PathBuf,

    /// Markdown output [default: <input>.md]
    #[arg(long)]
    pub md: Option<PathBuf>,

    /// LaTeX output [default: <input>.tex]
    #[arg(long)]
    pub tex: Option<PathBuf>,

    /// SVG image output [default: <input>.svg]
    #[arg(long)]
    pub svg: Option<PathBuf>,

    /// Title drawn above the image
    #[arg(long)]
    pub title: Option<String>,

    /// Wrap width for construct names in the image, in characters
    #[arg(long, default_value_t = 16)]
    pub wrap: usize,

    /// Font size for the image
    #[arg(long, default_value_t = 9)]
    pub font_size: u32,
}

pub fn cmd_render(args: RenderArgs) -> Result<(), CliError> {
    let defaults = RenderPaths::beside(&args.input);
    let out = RenderPaths {
        markdown: args.md.unwrap_or(defaults.markdown),
        latex: args.tex.unwrap_or(defaults.latex),
        svg: args.svg.unwrap_or(defaults.svg),
    };
    let options = SvgOptions {
        title: args.title,
        wrap: args.wrap,
        font_size: args.font_size,
    };

    let rows = render_files(&args.input, &out, &options).map_err(|e| CliError {
        code: io_exit_code(&e),
        message: e.to_string(),
        hint: None,
    })?;

    eprintln!("rendered {rows} constructs");
    for p in [&out.markdown, &out.latex, &out.svg] {
        eprintln!("wrote {}", p.display());
    }
    Ok(())
}
