use std::{
    collections::BTreeMap,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::error::{ConfigError, DiscoveryError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Testcase {
    name: String,
    input_path: PathBuf,
    expected_output_path: Option<PathBuf>,
}

impl Testcase {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<PathBuf>,
        expected_output: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            input_path: input.into(),
            expected_output_path: expected_output,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn expected_output_path(&self) -> Option<&Path> {
        self.expected_output_path.as_deref()
    }
}

/// Filename format of testcase files.
///
/// `%s` stands for the testcase name, `%e` for the extension (`in` or `out`)
/// and `%%` for a literal `%`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingFormat {
    format: String,
    glob: ::glob::Pattern,
}

impl NamingFormat {
    pub const DEFAULT: &'static str = "sample%s.%e";

    pub fn parse(format: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidFormat {
            format: format.to_owned(),
            reason: reason.to_owned(),
        };

        let mut glob = String::with_capacity(format.len());
        let mut chars = format.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                glob += &::glob::Pattern::escape(c.encode_utf8(&mut [0; 4]));
                continue;
            }
            match chars.next() {
                Some('s') | Some('e') => glob.push('*'),
                Some('%') => glob += &::glob::Pattern::escape("%"),
                Some(other) => return Err(invalid(&format!("unknown placeholder '%{}'", other))),
                None => return Err(invalid("trailing '%'")),
            }
        }
        if format.contains('/') {
            return Err(invalid("must be a file name, not a path"));
        }

        let glob = ::glob::Pattern::new(&glob).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            format: format.to_owned(),
            glob,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.format
    }

    pub fn glob(&self) -> &::glob::Pattern {
        &self.glob
    }
}

impl Default for NamingFormat {
    fn default() -> Self {
        Self::parse(Self::DEFAULT).unwrap_or_else(|_| unreachable!())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileRole {
    Input,
    ExpectedOutput,
}

impl FileRole {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "in" => Some(Self::Input),
            "out" => Some(Self::ExpectedOutput),
            _ => None,
        }
    }
}

/// Editor backups (`foo~`, `#foo#`) and dotfiles.
pub fn is_backup_or_hidden_file(path: &Path) -> bool {
    let Some(name) = path.file_name().map(OsStr::to_string_lossy) else {
        return false
    };
    name.ends_with('~') || (name.len() >= 2 && name.starts_with('#') && name.ends_with('#'))
        || name.starts_with('.')
}

/// Splits `sample-1.in` into (`sample-1`, `in`).
/// A leading dot does not start an extension.
fn split_stem_and_ext(path: &Path) -> (String, String) {
    let stem = path.file_stem().map(OsStr::to_string_lossy).unwrap_or_default();
    let ext = path.extension().map(OsStr::to_string_lossy).unwrap_or_default();
    (stem.into_owned(), ext.into_owned())
}

/// Groups files by stem into testcases sorted by name.
///
/// An input without an expected output is kept; an expected output without
/// an input is skipped.
pub fn construct_testcases(
    files: impl IntoIterator<Item = PathBuf>,
) -> Result<Vec<Testcase>, DiscoveryError> {
    let mut groups: BTreeMap<String, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
    for path in files {
        let (stem, ext) = self::split_stem_and_ext(&path);
        let role = FileRole::from_extension(&ext)
            .ok_or_else(|| DiscoveryError::UnrecognizedFile(path.clone()))?;
        let entry = groups.entry(stem).or_default();
        match role {
            FileRole::Input => entry.0 = Some(path),
            FileRole::ExpectedOutput => entry.1 = Some(path),
        }
    }

    let mut res = Vec::with_capacity(groups.len());
    for (name, (input, expected)) in groups {
        let Some(input) = input else {
            log::warn!("Skipped testcase '{}': no input file", name);
            continue
        };
        res.push(Testcase::new(name, input, expected));
    }
    Ok(res)
}

/// Finds testcase files in a directory.
#[derive(Debug, Clone)]
pub struct TestcaseRepository {
    dir: PathBuf,
    format: NamingFormat,
    ignore_backup: bool,
}

impl TestcaseRepository {
    pub fn new(dir: impl Into<PathBuf>, format: NamingFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            ignore_backup: true,
        }
    }

    pub fn ignore_backup(mut self, yes: bool) -> Self {
        self.ignore_backup = yes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All testcases matching the naming format, sorted by name.
    pub fn enumerate(&self) -> Result<Vec<Testcase>, DiscoveryError> {
        let files = fsutil::list_files_matching(&self.dir, self.format.glob())?;
        self.construct(files)
    }

    /// Testcases whose files are named `<name>.*`, for each of `names`.
    /// A name without any file is an error.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Testcase>, DiscoveryError> {
        let mut files = Vec::new();
        for name in names {
            let pattern = format!("{}.*", ::glob::Pattern::escape(name.as_ref()));
            let pattern = ::glob::Pattern::new(&pattern).map_err(|e| ConfigError::InvalidFormat {
                format: name.as_ref().to_owned(),
                reason: e.to_string(),
            })?;
            files.extend(fsutil::list_files_matching_nonempty(&self.dir, &pattern)?);
        }
        files.sort();
        files.dedup();
        self.construct(files)
    }

    fn construct(&self, files: Vec<PathBuf>) -> Result<Vec<Testcase>, DiscoveryError> {
        let files = files.into_iter().filter(|path| {
            let skip = self.ignore_backup && self::is_backup_or_hidden_file(path);
            if skip {
                log::debug!("Ignored backup or hidden file {:?}", path);
            }
            !skip
        });
        self::construct_testcases(files)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fsutil::write(dir.join(name), name).unwrap();
        }
    }

    #[test]
    fn naming_format_parse() {
        let f = NamingFormat::parse("sample%s.%e").unwrap();
        assert!(f.glob().matches("sample-1.in"));
        assert!(f.glob().matches("sample-2.out"));
        assert!(!f.glob().matches("example-1.in"));

        let f = NamingFormat::parse("100%%_%s.%e").unwrap();
        assert!(f.glob().matches("100%_a.in"));
        assert!(!f.glob().matches("100_a.in"));

        let f = NamingFormat::parse("[x]%s.%e").unwrap();
        assert!(f.glob().matches("[x]1.in"), "brackets are literal");
        assert!(!f.glob().matches("x1.in"));

        assert!(matches!(
            NamingFormat::parse("sample%i.%e"),
            Err(ConfigError::InvalidFormat { .. })
        ));
        assert!(NamingFormat::parse("sample%").is_err());
        assert!(NamingFormat::parse("dir/%s.%e").is_err());
        assert_eq!(NamingFormat::default().as_str(), "sample%s.%e");
    }

    #[test]
    fn backup_or_hidden() {
        assert!(is_backup_or_hidden_file(Path::new("a/sample-1.in~")));
        assert!(is_backup_or_hidden_file(Path::new("#sample-1.in#")));
        assert!(is_backup_or_hidden_file(Path::new(".sample-1.in")));
        assert!(!is_backup_or_hidden_file(Path::new("sample-1.in")));
        assert!(!is_backup_or_hidden_file(Path::new("#sample-1.in")));
    }

    #[test]
    fn enumerate_groups_by_stem_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &[
                "sample-2.in",
                "sample-2.out",
                "sample-1.in",
                "sample-1.out",
                "sample-3.in",
                "sample-4.out",
                "sample-1.in~",
                "memo.txt",
            ],
        );

        let repo = TestcaseRepository::new(dir.path(), NamingFormat::default());
        let got = repo.enumerate().unwrap();
        let d = dir.path();
        assert_eq!(
            got,
            vec![
                Testcase::new("sample-1", d.join("sample-1.in"), Some(d.join("sample-1.out"))),
                Testcase::new("sample-2", d.join("sample-2.in"), Some(d.join("sample-2.out"))),
                Testcase::new("sample-3", d.join("sample-3.in"), None),
            ]
        );
    }

    #[test]
    fn enumerate_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["sample-1.in", "sample-1.ans"]);

        let repo = TestcaseRepository::new(dir.path(), NamingFormat::default());
        let err = repo.enumerate().unwrap_err();
        assert!(matches!(err, DiscoveryError::UnrecognizedFile(p) if p.ends_with("sample-1.ans")));
    }

    #[test]
    fn enumerate_with_backup_files_kept() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["sample-1.in", "sample-1.in~"]);

        let repo = TestcaseRepository::new(dir.path(), NamingFormat::default()).ignore_backup(false);
        assert!(matches!(
            repo.enumerate(),
            Err(DiscoveryError::UnrecognizedFile(_))
        ));
    }

    #[test]
    fn enumerate_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let repo = TestcaseRepository::new(dir.path(), NamingFormat::default());
        assert_eq!(repo.enumerate().unwrap(), vec![]);
    }

    #[test]
    fn enumerate_missing_dir() {
        let repo = TestcaseRepository::new("/no/such/testcase/dir", NamingFormat::default());
        assert!(matches!(repo.enumerate(), Err(DiscoveryError::Fs(_))));
    }

    #[test]
    fn select_by_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &["sample-1.in", "sample-1.out", "sample-2.in", "sample-2.out"],
        );
        let repo = TestcaseRepository::new(dir.path(), NamingFormat::default());

        let got = repo.select(&["sample-2"]).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name(), "sample-2");
        assert_eq!(got[0].expected_output_path(), Some(dir.path().join("sample-2.out").as_path()));

        assert!(matches!(
            repo.select(&["sample-9"]),
            Err(DiscoveryError::Fs(fsutil::Error::NoEntryMatchedGlob(..)))
        ));
    }
}
