#![allow(clippy::module_inception)]

use std::rc::Rc;

use crate::errors::errors::{Error, ErrorTip};

pub mod ast;
pub mod codegen;
pub mod driver;
pub mod emulator;
pub mod errors;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod semantic;

extern crate regex;

pub use driver::driver::{compile_source, Compilation, STUB_PROGRAM};
pub use driver::options::{Capabilities, CompileOptions, LocalStorage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
    pub file: Rc<String>,
}

impl Position {
    pub fn new(offset: u32, line: u32, column: u32, file: Rc<String>) -> Self {
        Position {
            offset,
            line,
            column,
            file,
        }
    }

    pub fn null() -> Self {
        Position::new(0, 0, 0, Rc::new(String::from("<null>")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// Returns the 1-based line number, the text of that line and the 0-based
/// column of `position` within `source`.
pub fn get_line_at_position(source: &str, position: &Position) -> (usize, String, usize) {
    let line_number = position.line.max(1) as usize;
    let line = source
        .split_inclusive('\n')
        .nth(line_number - 1)
        .unwrap_or("")
        .to_string();

    (line_number, line, position.column.saturating_sub(1) as usize)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::Position;

    #[test]
    fn test_get_line_at_position() {
        let source = "Hello, world!\nsecond\nthird\nTesting { }\n";
        let file = Rc::new(String::from("test.decaf"));

        let (line_number, line, line_pos) =
            super::get_line_at_position(source, &Position::new(10, 1, 11, Rc::clone(&file)));
        assert_eq!(line_number, 1);
        assert_eq!(line, "Hello, world!\n");
        assert_eq!(line_pos, 10);

        let (line_number, line, line_pos) =
            super::get_line_at_position(source, &Position::new(34, 4, 9, file));
        assert_eq!(line_number, 4);
        assert_eq!(line, "Testing { }\n");
        assert_eq!(line_pos, 8);
    }

    #[test]
    fn test_render_error_points_at_column() {
        use crate::errors::errors::{Error, ErrorImpl};

        let source = "void main() {\n    x = 1;\n}\n";
        let error = Error::new(
            ErrorImpl::VariableNotDeclared {
                variable: String::from("x"),
            },
            Position::new(18, 2, 5, Rc::new(String::from("main.decaf"))),
        );

        let rendered = super::render_error(&error, source);
        assert!(rendered.starts_with("Error: VariableNotDeclared"));
        assert!(rendered.contains("-> main.decaf"));
        assert!(rendered.contains("2 | x = 1;"));
        assert!(rendered.ends_with("^\n"));
    }
}

/// Renders an error with the offending source line and a caret under the
/// reported column.
pub fn render_error(error: &Error, source: &str) -> String {
    /*
        Error: message
        -> main.decaf
           |
        20 | x = y + ;
           | --------^
    */

    let position = error.get_position();
    let (line, line_text, line_pos) = get_line_at_position(source, position);

    let line_string = line.to_string();
    let padding = line_string.len() + 2;

    let mut out = String::new();
    if let ErrorTip::None = error.get_tip() {
        out.push_str(&format!("Error: {}\n", error.get_error_name()));
    } else {
        out.push_str(&format!(
            "Error: {} ({})\n",
            error.get_error_name(),
            error.get_tip()
        ));
    }
    out.push_str(&format!("-> {}\n", position.file));
    out.push_str(&format!("{:>padding$}\n", "|"));

    let (line_text_removed, removed_whitespace) = remove_starting_whitespace(&line_text);
    out.push_str(&format!("{} | {}\n", line_string, line_text_removed.trim()));

    let arrows = line_pos.saturating_sub(removed_whitespace) + 1;
    out.push_str(&format!("{:>padding$} {:->arrows$}\n", "|", "^"));

    out
}

fn remove_starting_whitespace(string: &str) -> (String, usize) {
    let start = string
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .count();

    (String::from(&string[start..]), start)
}
