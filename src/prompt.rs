use std::io::{BufRead, Write};

use anyhow::Context as _;

/// Human disambiguation hooks. Implementations block until an answer is given.
pub trait Prompt {
    /// Yes/no question. Anything other than an affirmative answer is `false`.
    fn confirm(&mut self, question: &str) -> anyhow::Result<bool>;

    /// Pick one of `options`; `None` means the user chose to skip.
    fn select(&mut self, question: &str, options: &[String]) -> anyhow::Result<Option<usize>>;

    /// Pick one of `options`; re-asks until a valid index is given.
    fn choose(&mut self, question: &str, options: &[String]) -> anyhow::Result<usize>;
}

/// Line-oriented prompt over any reader/writer pair (stdin/stderr in the CLI).
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl LinePrompt<std::io::StdinLock<'static>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> anyhow::Result<String> {
        write!(self.output, "{question} ").context("write prompt")?;
        self.output.flush().context("flush prompt")?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read answer")?;
        if read == 0 {
            anyhow::bail!("input closed while waiting for an answer");
        }
        Ok(line.trim().to_owned())
    }

    fn list_options(&mut self, options: &[String]) -> anyhow::Result<()> {
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "{}. {option}", i + 1).context("write option")?;
        }
        Ok(())
    }
}

const AFFIRMATIVE: &[&str] = &["y", "yes", "是", "确认"];

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn confirm(&mut self, question: &str) -> anyhow::Result<bool> {
        let answer = self.ask(&format!("{question} [y/N]"))?;
        Ok(AFFIRMATIVE.contains(&answer.to_lowercase().as_str()))
    }

    fn select(&mut self, question: &str, options: &[String]) -> anyhow::Result<Option<usize>> {
        if options.is_empty() {
            return Ok(None);
        }
        writeln!(self.output, "{question}").context("write prompt")?;
        self.list_options(options)?;

        loop {
            let answer = self.ask(&format!("number 1-{} (0 to skip):", options.len()))?;
            match answer.parse::<usize>() {
                Ok(0) => return Ok(None),
                Ok(n) if n <= options.len() => return Ok(Some(n - 1)),
                _ => writeln!(self.output, "invalid choice: {answer}").context("write prompt")?,
            }
        }
    }

    fn choose(&mut self, question: &str, options: &[String]) -> anyhow::Result<usize> {
        if options.is_empty() {
            anyhow::bail!("nothing to choose from: {question}");
        }
        writeln!(self.output, "{question}").context("write prompt")?;
        self.list_options(options)?;

        loop {
            let answer = self.ask(&format!("number 1-{}:", options.len()))?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => writeln!(self.output, "invalid choice: {answer}").context("write prompt")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn prompt(input: &str) -> LinePrompt<Cursor<Vec<u8>>, Vec<u8>> {
        LinePrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn options() -> Vec<String> {
        vec!["first".to_owned(), "second".to_owned()]
    }

    #[test]
    fn confirm_accepts_affirmatives_only() {
        assert!(prompt("yes\n").confirm("ok?").unwrap());
        assert!(prompt("是\n").confirm("ok?").unwrap());
        assert!(!prompt("no\n").confirm("ok?").unwrap());
        assert!(!prompt("\n").confirm("ok?").unwrap());
    }

    #[test]
    fn select_retries_until_valid_and_supports_skip() {
        assert_eq!(
            prompt("9\nabc\n2\n").select("pick", &options()).unwrap(),
            Some(1)
        );
        assert_eq!(prompt("0\n").select("pick", &options()).unwrap(), None);
    }

    #[test]
    fn choose_rejects_zero() {
        assert_eq!(prompt("0\n1\n").choose("pick", &options()).unwrap(), 0);
    }

    #[test]
    fn closed_input_is_an_error() {
        let err = prompt("").choose("pick", &options()).unwrap_err();
        assert!(err.to_string().contains("input closed"));
    }
}
