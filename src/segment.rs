use serde::{Deserialize, Serialize};

use crate::utils::{DocError, Result};
use crate::walker::{SlotKind, SlotLocation};

/// 提取的文本片段
///
/// 导出为 JSON 交给翻译流程，`index` 是片段在 `extract()` 序列中的位置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub text: String,
    /// 槽位类型（仅树形文档）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SlotKind>,
    /// 所属元素名称（仅树形文档）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl Segment {
    /// 从提取结果创建片段列表
    pub fn from_texts(texts: Vec<String>) -> Vec<Self> {
        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Segment {
                index,
                text,
                kind: None,
                node: None,
            })
            .collect()
    }

    /// 附加槽位定位信息
    pub fn with_locations(texts: Vec<String>, locations: &[SlotLocation]) -> Vec<Self> {
        let mut segments = Self::from_texts(texts);
        for (segment, location) in segments.iter_mut().zip(locations) {
            segment.kind = Some(location.kind);
            segment.node = Some(location.node.clone());
        }
        segments
    }
}

/// 替换条目
///
/// `text` 为 `null` 表示保留原文。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub index: usize,
    pub text: Option<String>,
}

impl Replacement {
    /// 把稀疏的替换条目展开为长度为 `count` 的 swap 序列
    ///
    /// 未出现的位置填 `None`（保留原文）。
    /// 索引越界或重复时返回 [`DocError::InvalidReplacement`]。
    pub fn into_sequence(replacements: Vec<Replacement>, count: usize) -> Result<Vec<Option<String>>> {
        let mut sequence = vec![None; count];
        let mut seen = vec![false; count];

        for replacement in replacements {
            let index = replacement.index;
            if index >= count {
                return Err(DocError::InvalidReplacement(format!(
                    "index {} out of range (document has {} segments)",
                    index, count
                )));
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(DocError::InvalidReplacement(format!("duplicate index {}", index)));
            }
            sequence[index] = replacement.text;
        }

        Ok(sequence)
    }

    /// 解析 JSON 替换列表
    pub fn parse_json(json: &str) -> Result<Vec<Replacement>> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_to_json() {
        let segments = Segment::from_texts(vec!["Hello".to_string(), "World".to_string()]);
        let json = serde_json::to_string(&segments).unwrap();
        assert_eq!(json, r#"[{"index":0,"text":"Hello"},{"index":1,"text":"World"}]"#);
    }

    #[test]
    fn test_segments_with_locations() {
        let locations = vec![
            SlotLocation { index: 0, kind: SlotKind::Text, node: "p".to_string() },
            SlotLocation { index: 1, kind: SlotKind::Tail, node: "b".to_string() },
        ];
        let segments = Segment::with_locations(vec!["a".to_string(), "b".to_string()], &locations);

        let json = serde_json::to_string(&segments[1]).unwrap();
        assert_eq!(json, r#"{"index":1,"text":"b","kind":"tail","node":"b"}"#);
    }

    #[test]
    fn test_into_sequence_fills_gaps() {
        let replacements = Replacement::parse_json(
            r#"[{"index":2,"text":"drei"},{"index":0,"text":"eins"},{"index":1,"text":null}]"#,
        )
        .unwrap();

        let sequence = Replacement::into_sequence(replacements, 4).unwrap();
        assert_eq!(
            sequence,
            vec![Some("eins".to_string()), None, Some("drei".to_string()), None]
        );
    }

    #[test]
    fn test_into_sequence_rejects_bad_indices() {
        let out_of_range = vec![Replacement { index: 3, text: Some("x".to_string()) }];
        assert!(matches!(
            Replacement::into_sequence(out_of_range, 3),
            Err(DocError::InvalidReplacement(_))
        ));

        let duplicate = vec![
            Replacement { index: 0, text: Some("x".to_string()) },
            Replacement { index: 0, text: Some("y".to_string()) },
        ];
        assert!(matches!(
            Replacement::into_sequence(duplicate, 1),
            Err(DocError::InvalidReplacement(_))
        ));
    }

    #[test]
    fn test_parse_json_error() {
        assert!(matches!(
            Replacement::parse_json("not json"),
            Err(DocError::JsonError(_))
        ));
    }
}
