use super::{entry_extension, FileOperation, OperationKind};
use crate::archive::EntryRef;
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use crate::utils;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const TEXT_EXTENSIONS: [&str; 3] = ["log", "txt", "cue"];

pub(crate) const UTF8_BOM: &str = "\u{feff}";

/// Rewrites a text file in UTF-8 with a byte order mark.
///
/// The source charset comes from a BOM if present, then UTF-8 validity,
/// then statistical detection over the non-ASCII content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixEncoding {
    /// WHATWG label used instead of detection, e.g. `"shift_jis"`.
    pub assume_encoding: Option<String>,
}

impl FixEncoding {
    fn assumed(&self) -> Result<Option<&'static Encoding>, OperationError> {
        self.assume_encoding
            .as_deref()
            .map(|label| {
                Encoding::for_label(label.as_bytes()).ok_or_else(|| {
                    OperationError::InvalidInput(format!("unknown encoding label '{label}'"))
                })
            })
            .transpose()
    }
}

/// Decodes `bytes` to text, returning the encoding that was used.
pub(crate) fn decode_text(
    bytes: &[u8],
    assume: Option<&'static Encoding>,
) -> (String, &'static Encoding) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text.into_owned(), encoding);
    }

    let encoding = assume.unwrap_or_else(|| detect_encoding(bytes));
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    (text.into_owned(), encoding)
}

fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if bytes.is_ascii() || std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

impl FileOperation for FixEncoding {
    const KIND: OperationKind = OperationKind::FixEncoding;

    fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>> {
        let [input] = inputs else {
            return None;
        };
        let ext = entry_extension(input)?;
        TEXT_EXTENSIONS
            .contains(&ext.as_str())
            .then(|| vec![input.key().to_string()])
    }

    fn execute(
        &self,
        inputs: &[EntryRef],
        outputs: &[PathBuf],
        _ctx: &ExecutionContext,
    ) -> Result<(), OperationError> {
        let [input] = inputs else {
            return Err(OperationError::not_applicable(Self::KIND.as_str()));
        };
        OperationError::check_outputs(1, outputs.len())?;

        let bytes = input.read_all()?;
        let (text, encoding) = decode_text(&bytes, self.assumed()?);
        debug!(key = input.key(), encoding = encoding.name(), "Re-encoding text as UTF-8");

        utils::ensure_parent_dirs(outputs)?;
        std::fs::write(&outputs[0], format!("{UTF8_BOM}{text}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryEntry;
    use crate::config::FlussConfig;
    use encoding_rs::{SHIFT_JIS, UTF_16LE};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    const JAPANESE: &str = "アルバム「夜明けの歌」のログファイルです。\r\n\
        この録音はすべてのトラックで正確にコピーされました。\r\n\
        使用したドライブの読み取りオフセットは正しく設定されています。\r\n\
        トラック一覧：一曲目は春の風、二曲目は夏の海、三曲目は秋の月です。\r\n";

    fn entry(key: &str, data: Vec<u8>) -> EntryRef {
        Arc::new(MemoryEntry::file(key, data))
    }

    fn run(op: &FixEncoding, input: EntryRef) -> String {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let ctx = ExecutionContext::new(&FlussConfig::default());
        op.execute(&[input], &[out.clone()], &ctx).unwrap();
        std::fs::read_to_string(out).unwrap()
    }

    #[test]
    fn test_pass_accepts_text_extensions() {
        let mut op = FixEncoding::default();
        assert_eq!(
            op.pass(&[entry("CD1/Rip.LOG", Vec::new())]),
            Some(vec!["CD1/Rip.LOG".to_string()])
        );
        assert_eq!(op.pass(&[entry("album.cue", Vec::new())]).map(|v| v.len()), Some(1));
        assert_eq!(op.pass(&[entry("album.flac", Vec::new())]), None);
        assert_eq!(
            op.pass(&[entry("a.txt", Vec::new()), entry("b.txt", Vec::new())]),
            None
        );
    }

    #[test]
    fn test_detects_shift_jis() {
        let (bytes, _, _) = SHIFT_JIS.encode(JAPANESE);
        let (text, encoding) = decode_text(&bytes, None);
        assert_eq!(encoding, SHIFT_JIS);
        assert_eq!(text, JAPANESE);
    }

    #[test]
    fn test_execute_writes_utf8_with_bom() {
        let (bytes, _, _) = SHIFT_JIS.encode(JAPANESE);
        let written = run(&FixEncoding::default(), entry("rip.log", bytes.into_owned()));
        assert_eq!(written, format!("{UTF8_BOM}{JAPANESE}"));
    }

    #[test]
    fn test_bom_takes_precedence() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "PERFORMER \"Ensemble\"".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }

        let (text, encoding) = decode_text(&bytes, None);
        assert_eq!(encoding, UTF_16LE);
        assert_eq!(text, "PERFORMER \"Ensemble\"");
    }

    #[test]
    fn test_assumed_encoding_overrides_detection() {
        let op = FixEncoding {
            assume_encoding: Some("windows-1252".to_string()),
        };
        let written = run(&op, entry("notes.txt", vec![b'c', b'a', b'f', 0xE9]));
        assert_eq!(written, format!("{UTF8_BOM}café"));
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let op = FixEncoding {
            assume_encoding: Some("klingon".to_string()),
        };
        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(&FlussConfig::default());
        let err = op
            .execute(&[entry("a.txt", b"abc".to_vec())], &[dir.path().join("a.txt")], &ctx)
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidInput(_)));
    }

    #[test]
    fn test_utf8_is_kept() {
        let input = entry("a.cue", "TITLE \"Ça va\"".as_bytes().to_vec());
        let written = run(&FixEncoding::default(), input);
        assert_eq!(written, format!("{UTF8_BOM}TITLE \"Ça va\""));
    }
}
