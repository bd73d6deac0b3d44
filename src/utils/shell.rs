//! Shell escaping and quoting utilities.
//!
//! Three dialects are covered:
//! - POSIX `sh` (single-quote wrapping)
//! - Windows process arguments as parsed by the MSVC runtime and `cmd.exe`
//! - PowerShell single-quoted string literals

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for POSIX shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    // Characters that require quoting
    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments for POSIX shell execution.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a single argument for a Windows command line.
///
/// Follows the MSVC runtime parsing rules: backslashes are literal unless they
/// precede a double quote, in which case they are doubled. Arguments are
/// wrapped in double quotes when they contain whitespace, quotes, or `cmd.exe`
/// operators, so `&`, `|`, `<`, `>` and `^` reach the program untouched.
pub fn quote_windows_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "\"\"".to_string();
    }

    const CMD_META: &[char] = &[' ', '\t', '\n', '"', '&', '|', '<', '>', '^', '(', ')', ';', ','];

    if !arg.contains(CMD_META) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');

    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat('\\').take(backslashes));
                quoted.push(c);
                backslashes = 0;
            }
        }
    }
    // Trailing backslashes would escape the closing quote
    quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
    quoted.push('"');
    quoted
}

/// Quote and join multiple arguments for a Windows command line.
pub fn quote_windows_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_windows_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a PowerShell single-quoted literal. Embedded `'` are doubled.
pub fn powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Split an interpreter spec such as `"bash -e"` into its words.
///
/// Empty or whitespace-only input yields an empty list.
pub fn split_words(spec: &str) -> Vec<String> {
    spec.split_whitespace().map(|s| s.to_string()).collect()
}
