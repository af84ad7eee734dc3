//! Command line quoting and tokenizing.
//!
//! The launcher accepts one assembled command line string. Quoting follows
//! the C runtime rules used by `CommandLineToArgvW`: an argument is wrapped
//! in double quotes when it is empty or contains whitespace or a quote, a
//! literal quote is escaped as `\"`, and backslashes are only special when
//! they precede a quote.
//!
//! [`split_command_line`] is the inverse. On Windows the child's runtime
//! performs the split; elsewhere the launcher uses it to rebuild `argv`.

/// Characters that force an argument to be quoted.
const SPECIAL_CHARS: &[char] = &[' ', '\t', '\n', '\x0b', '"'];

/// Join `args` into a single command line that tokenizes back to `args`.
///
/// # Examples
///
/// ```rust
/// use childpipe_process::quote_command_line;
///
/// assert_eq!(quote_command_line(&["echo", "a b", ""]), r#"echo "a b" """#);
/// assert_eq!(quote_command_line::<&str>(&[]), "");
/// ```
pub fn quote_command_line<S: AsRef<str>>(args: &[S]) -> String {
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        append_quoted(&mut line, arg.as_ref());
    }
    line
}

fn append_quoted(line: &mut String, arg: &str) {
    if !arg.is_empty() && !arg.contains(SPECIAL_CHARS) {
        line.push_str(arg);
        return;
    }

    line.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                // Escape the pending backslashes and the quote itself.
                push_backslashes(line, backslashes * 2 + 1);
                line.push('"');
                backslashes = 0;
            }
            _ => {
                push_backslashes(line, backslashes);
                line.push(c);
                backslashes = 0;
            }
        }
    }
    // Backslashes before the closing quote must be doubled.
    push_backslashes(line, backslashes * 2);
    line.push('"');
}

fn push_backslashes(line: &mut String, count: usize) {
    line.extend(std::iter::repeat('\\').take(count));
}

/// Split a command line into arguments using the same rules as
/// [`quote_command_line`].
///
/// Unbalanced quotes are tolerated: an unterminated quoted section runs to
/// the end of the line.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' if !in_quotes => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\\' => {
                in_token = true;
                let mut backslashes = 1usize;
                while chars.peek() == Some(&'\\') {
                    chars.next();
                    backslashes += 1;
                }
                if chars.peek() == Some(&'"') {
                    push_backslashes(&mut current, backslashes / 2);
                    if backslashes % 2 == 1 {
                        chars.next();
                        current.push('"');
                    }
                } else {
                    push_backslashes(&mut current, backslashes);
                }
            }
            '"' => {
                in_token = true;
                if in_quotes && chars.peek() == Some(&'"') {
                    // `""` inside a quoted section is a literal quote.
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
            }
            _ => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        args.push(current);
    }
    args
}
