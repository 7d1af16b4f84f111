//! HTML report assembly.
//!
//! One section per processed page: the page image (when previews were kept),
//! then every extracted table, or a notice saying why there is none.

use crate::output::{ExtractionOutput, PageOutcome, PageResult};
use crate::table::escape_html;
use std::fmt::Write;

const STYLE: &str = "\
body { font-family: sans-serif; margin: 2rem; }
section.page { margin-bottom: 3rem; }
img.page { max-width: 100%; border: 1px solid #ccc; }
table { border-collapse: collapse; margin: 1rem 0; }
th, td { border: 1px solid #999; padding: 0.25rem 0.5rem; vertical-align: top; }
caption { font-weight: bold; text-align: left; }
p.notice { color: #555; }
p.error { color: #b00020; }";

/// Notice shown for a page on which the service found no table.
pub fn no_tables_notice(page_num: usize) -> String {
    format!("No tables detected on page {page_num}.")
}

/// Notice shown for a page whose extraction failed.
pub fn failure_notice(page_num: usize, error: &str) -> String {
    format!("Failed to extract tables from page {page_num}: {error}")
}

/// Render the whole run as a standalone HTML document.
pub fn render_html(output: &ExtractionOutput, title: &str) -> String {
    let mut html = String::new();
    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html>\n<head>\n<meta charset=\"utf-8\">");
    let _ = writeln!(html, "<title>{}</title>", escape_html(title));
    let _ = writeln!(html, "<style>\n{STYLE}\n</style>\n</head>\n<body>");
    let _ = writeln!(html, "<h1>{}</h1>", escape_html(title));

    let stats = &output.stats;
    let _ = writeln!(
        html,
        "<p class=\"notice\">{} of {} pages processed: {} tables on {} pages, {} without tables, {} failed.</p>",
        stats.processed_pages,
        stats.total_pages,
        stats.total_tables,
        stats.pages_with_tables,
        stats.empty_pages,
        stats.failed_pages
    );

    for page in &output.pages {
        render_page(&mut html, page);
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_page(html: &mut String, page: &PageResult) {
    let n = page.page_num;
    let _ = writeln!(html, "<section class=\"page\" id=\"page-{n}\">");
    let _ = writeln!(html, "<h2>Page {n}</h2>");
    if let Some(ref uri) = page.preview {
        let _ = writeln!(html, "<img class=\"page\" alt=\"Page {n}\" src=\"{uri}\">");
    }

    match page.outcome {
        PageOutcome::TablesFound(ref tables) => {
            for (i, table) in tables.iter().enumerate() {
                let j = i + 1;
                let _ = writeln!(html, "<h3>Extracted Table from Page {n}, Table {j}</h3>");
                html.push_str(&table.to_html(Some(&format!("Extracted Table {j}"))));
                html.push('\n');
            }
        }
        PageOutcome::NoTablesFound => {
            let _ = writeln!(html, "<p class=\"notice\">{}</p>", no_tables_notice(n));
        }
        PageOutcome::ExtractionFailed(ref e) => {
            let _ = writeln!(
                html,
                "<p class=\"error\">{}</p>",
                escape_html(&failure_notice(n, &e.to_string()))
            );
        }
    }
    html.push_str("</section>\n");
}
