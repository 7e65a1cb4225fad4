use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Where a document is read from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Input {
    #[default]
    Stdin,
    File(PathBuf),
}

impl Input {
    /// `None` and `-` both mean standard input.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("-") | Some("") => Input::Stdin,
            Some(path) => Input::File(PathBuf::from(path)),
        }
    }

    pub fn open(&self) -> io::Result<Box<dyn BufRead>> {
        match self {
            Input::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
            Input::File(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Input::Stdin => None,
            Input::File(path) => Some(path),
        }
    }
}

/// Where the converted document is written to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Output {
    #[default]
    Stdout,
    File(PathBuf),
}

impl Output {
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("-") | Some("") => Output::Stdout,
            Some(path) => Output::File(PathBuf::from(path)),
        }
    }

    pub fn open(&self) -> io::Result<Box<dyn Write>> {
        match self {
            Output::Stdout => Ok(Box::new(BufWriter::new(io::stdout()))),
            Output::File(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_from_arg() {
        assert_eq!(Input::from_arg(None), Input::Stdin);
        assert_eq!(Input::from_arg(Some("-")), Input::Stdin);
        assert_eq!(
            Input::from_arg(Some("doc.lyx")),
            Input::File(PathBuf::from("doc.lyx"))
        );
        assert_eq!(Output::from_arg(Some("-")), Output::Stdout);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.lyx");
        {
            let mut writer = Output::File(path.clone()).open().unwrap();
            writer.write_all(b"\\lyxformat 221\n").unwrap();
            writer.flush().unwrap();
        }
        let mut text = String::new();
        Input::File(path).open().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "\\lyxformat 221\n");
    }
}
