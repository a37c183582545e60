use std::path::{Path, PathBuf};

use tracing::info;
use umya_spreadsheet::helper::coordinate::string_from_column_index;
use umya_spreadsheet::{HorizontalAlignmentValues, Spreadsheet, VerticalAlignmentValues, Worksheet};

use crate::error::Error;

pub const PROMPT_HEADER: &str = "用户提示词";
pub const FLAG_HEADER: &str = "是否生成 (0 是 1 否)";
const SHEET_TITLE: &str = "AI Prompts Comparison";
const FONT_NAME: &str = "Source Han Sans CN";

const PROMPT_COL: u32 = 1;
const FLAG_COL: u32 = 2;
const FIRST_RESULT_COL: u32 = 3;

/// What the generate-flag cell of a row says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagState {
    /// Flag is 0: the row wants results.
    Generate,
    /// Flag is 1: the row is finished.
    Done,
    /// Some other number; the row is skipped.
    Invalid(String),
    /// Empty or non-numeric; reset to 0 and processed.
    Unset,
}

pub fn parse_flag(raw: &str) -> FlagState {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FlagState::Unset;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value == 0.0 => FlagState::Generate,
        Ok(value) if value == 1.0 => FlagState::Done,
        Ok(_) => FlagState::Invalid(trimmed.to_string()),
        Err(_) => FlagState::Unset,
    }
}

#[derive(Debug, Clone)]
pub struct PromptRow {
    pub row: u32,
    pub prompt: String,
    pub flag: FlagState,
}

/// The prompts workbook: column A holds user prompts, column B the generate
/// flag, and columns C onward one result column per enabled model.
pub struct PromptSheet {
    book: Spreadsheet,
    path: PathBuf,
    model_cols: Vec<(String, u32)>,
}

impl PromptSheet {
    /// Opens the workbook, creating it with a formatted header row when
    /// absent. An existing file must carry exactly the expected headers for
    /// the current set of enabled models.
    pub fn open_or_create(path: &Path, model_names: &[String]) -> Result<Self, Error> {
        if path.exists() {
            Self::open(path, model_names)
        } else {
            Self::create(path, model_names)
        }
    }

    fn open(path: &Path, model_names: &[String]) -> Result<Self, Error> {
        info!(path = %path.display(), "loading workbook");
        let book = umya_spreadsheet::reader::xlsx::read(path)
            .map_err(|e| Error::Sheet(format!("failed to load '{}': {}", path.display(), e)))?;

        let expected = expected_headers(model_names);
        let found = header_row(book.get_active_sheet());
        if found != expected {
            return Err(Error::Sheet(format!(
                "header mismatch in '{}': expected [{}], found [{}]; \
                 adjust the configured models or delete the workbook",
                path.display(),
                expected.join(", "),
                found.join(", ")
            )));
        }

        Ok(Self {
            book,
            path: path.to_path_buf(),
            model_cols: model_columns(model_names),
        })
    }

    fn create(path: &Path, model_names: &[String]) -> Result<Self, Error> {
        let headers = expected_headers(model_names);
        info!(path = %path.display(), headers = %headers.join(", "), "creating workbook");

        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_active_sheet_mut();
        sheet.set_name(SHEET_TITLE);
        for (idx, header) in headers.iter().enumerate() {
            sheet.get_cell_mut((idx as u32 + 1, 1)).set_value(header);
        }

        let mut this = Self {
            book,
            path: path.to_path_buf(),
            model_cols: model_columns(model_names),
        };
        this.apply_formatting();
        this.save()?;
        Ok(this)
    }

    /// Result column for a model name, as assigned at open time.
    pub fn result_column(&self, model_name: &str) -> Option<u32> {
        self.model_cols
            .iter()
            .find(|(name, _)| name == model_name)
            .map(|(_, col)| *col)
    }

    /// Fills empty flag cells with 0 so untouched rows get processed.
    /// Returns how many cells were defaulted; the caller saves if any were.
    pub fn default_missing_flags(&mut self) -> usize {
        let sheet = self.book.get_active_sheet_mut();
        let mut defaulted = 0;
        for row in 2..=sheet.get_highest_row() {
            if sheet.get_value((FLAG_COL, row)).trim().is_empty() {
                sheet.get_cell_mut((FLAG_COL, row)).set_value_number(0i32);
                defaulted += 1;
            }
        }
        defaulted
    }

    /// Snapshot of all data rows, starting at row 2.
    pub fn read_rows(&self) -> Vec<PromptRow> {
        let sheet = self.book.get_active_sheet();
        (2..=sheet.get_highest_row())
            .map(|row| PromptRow {
                row,
                prompt: sheet.get_value((PROMPT_COL, row)),
                flag: parse_flag(&sheet.get_value((FLAG_COL, row))),
            })
            .collect()
    }

    pub fn write_result(&mut self, row: u32, column: u32, text: &str) {
        self.book
            .get_active_sheet_mut()
            .get_cell_mut((column, row))
            .set_value(text);
    }

    pub fn set_flag(&mut self, row: u32, value: u32) {
        self.book
            .get_active_sheet_mut()
            .get_cell_mut((FLAG_COL, row))
            .set_value_number(value);
    }

    /// Column widths, fonts and wrap alignment for the whole sheet. Result
    /// cells are top/left so long generations read naturally; everything else
    /// is centered.
    pub fn apply_formatting(&mut self) {
        let sheet = self.book.get_active_sheet_mut();
        let max_col = sheet.get_highest_column();
        let max_row = sheet.get_highest_row();

        for col in 1..=max_col {
            let width = match col {
                PROMPT_COL => 40.0,
                FLAG_COL => 15.0,
                c if c >= FIRST_RESULT_COL => 60.0,
                _ => 20.0,
            };
            let letter = string_from_column_index(&col);
            sheet.get_column_dimension_mut(&letter).set_width(width);
        }

        for row in 1..=max_row {
            for col in 1..=max_col {
                if sheet.get_value((col, row)).is_empty() {
                    continue;
                }
                let style = sheet.get_style_mut((col, row));

                let font = style.get_font_mut();
                font.set_name(FONT_NAME);
                if row == 1 {
                    font.set_size(14.0);
                    font.set_bold(true);
                } else {
                    font.set_size(12.0);
                    font.set_bold(false);
                }

                let alignment = style.get_alignment_mut();
                alignment.set_wrap_text(true);
                if row > 1 && col >= FIRST_RESULT_COL {
                    alignment.set_vertical(VerticalAlignmentValues::Top);
                    alignment.set_horizontal(HorizontalAlignmentValues::Left);
                } else {
                    alignment.set_vertical(VerticalAlignmentValues::Center);
                    alignment.set_horizontal(HorizontalAlignmentValues::Center);
                }
            }
            sheet.get_row_dimension_mut(&row).set_height(21.0);
        }
    }

    /// Persists the workbook. Fails with an IO-kind error when the file
    /// cannot be written, e.g. while it is open in a spreadsheet program.
    pub fn save(&self) -> Result<(), Error> {
        umya_spreadsheet::writer::xlsx::write(&self.book, &self.path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to save '{}': {} (is the file open in another program?)",
                self.path.display(),
                e
            )))
        })
    }
}

fn expected_headers(model_names: &[String]) -> Vec<String> {
    let mut headers = vec![PROMPT_HEADER.to_string(), FLAG_HEADER.to_string()];
    headers.extend(model_names.iter().cloned());
    headers
}

fn model_columns(model_names: &[String]) -> Vec<(String, u32)> {
    model_names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.clone(), FIRST_RESULT_COL + idx as u32))
        .collect()
}

fn header_row(sheet: &Worksheet) -> Vec<String> {
    let mut headers: Vec<String> = (1..=sheet.get_highest_column())
        .map(|col| sheet.get_value((col, 1)))
        .collect();
    while headers.last().is_some_and(|header| header.is_empty()) {
        headers.pop();
    }
    headers
}
