use crate::measure::LineMeasure;

pub const DEFAULT_CHARS_PER_LINE: usize = 60;
pub const DEFAULT_LINES_PER_PAGE: usize = 30;
pub const DEFAULT_PDF_BIN: &str = "weasyprint";

/// Page geometry for the line-count measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    pub chars_per_line: usize,
    pub lines_per_page: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            chars_per_line: DEFAULT_CHARS_PER_LINE,
            lines_per_page: DEFAULT_LINES_PER_PAGE,
        }
    }
}

impl LayoutConfig {
    pub fn from_env() -> Self {
        Self {
            chars_per_line: env_usize("BOOKAUTHOR_CHARS_PER_LINE")
                .unwrap_or(DEFAULT_CHARS_PER_LINE),
            lines_per_page: env_usize("BOOKAUTHOR_LINES_PER_PAGE")
                .unwrap_or(DEFAULT_LINES_PER_PAGE),
        }
    }

    /// Replaces fields with explicit overrides (typically CLI flags).
    pub fn with_overrides(self, chars_per_line: Option<usize>, lines_per_page: Option<usize>) -> Self {
        Self {
            chars_per_line: chars_per_line.unwrap_or(self.chars_per_line),
            lines_per_page: lines_per_page.unwrap_or(self.lines_per_page),
        }
    }

    pub fn measure(&self) -> LineMeasure {
        LineMeasure::new(self.chars_per_line, self.lines_per_page as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub pdf_bin: String,
}

impl ExportConfig {
    pub fn from_env() -> Self {
        let pdf_bin =
            std::env::var("BOOKAUTHOR_PDF_BIN").unwrap_or_else(|_| DEFAULT_PDF_BIN.to_owned());
        Self { pdf_bin }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid positive integer");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let config = LayoutConfig::default().with_overrides(Some(40), None);
        assert_eq!(config.chars_per_line, 40);
        assert_eq!(config.lines_per_page, DEFAULT_LINES_PER_PAGE);
        assert_eq!(config.measure(), LineMeasure::new(40, 30.0));
    }
}
