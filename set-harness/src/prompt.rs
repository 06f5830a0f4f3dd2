//! Interactive confirmation before steps with side effects.

use std::io::{self, BufRead, Write};

/// Asks a yes/no question until it gets an answer.
///
/// Accepts `y`/`yes` and `n`/`no` in any case. End of input counts as no.
pub fn ask_for_confirmation<R, W>(question: &str, input: &mut R, output: &mut W) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(output, "{question} [y/n]: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(input: &str) -> (bool, String) {
        let mut output = Vec::new();
        let answer = ask_for_confirmation("deploy?", &mut input.as_bytes(), &mut output).unwrap();
        (answer, String::from_utf8(output).unwrap())
    }

    #[test]
    fn accepts_yes() {
        assert!(ask("y\n").0);
        assert!(ask("YES\n").0);
    }

    #[test]
    fn accepts_no() {
        assert!(!ask("n\n").0);
        assert!(!ask(" No \n").0);
    }

    #[test]
    fn asks_again_on_other_input() {
        let (answer, output) = ask("maybe\n\nyes\n");
        assert!(answer);
        assert_eq!(output.matches("deploy? [y/n]: ").count(), 3);
    }

    #[test]
    fn eof_declines() {
        assert!(!ask("").0);
    }
}
