/// 文本槽位遍历模块
///
/// 对任意实现了 [`TextNode`] 的树做先序遍历，按文档顺序提取可翻译文本，
/// 并以完全相同的顺序把替换文本写回。
///
/// # 文档顺序
///
/// 对每个节点：先是自身文本（text），然后依次是每个子节点的全部槽位，
/// 最后是该节点的尾随文本（tail）。
///
/// ```text
/// <a>X<b>Y</b>Z</a>   =>   ["X", "Y", "Z"]
///     a.text = "X", b.text = "Y", b.tail = "Z"
/// ```
///
/// 空白或缺失的槽位既不会被提取，也不会被替换。
use serde::{Deserialize, Serialize};

use crate::utils::{is_eligible_text, DocError, Result};

/// 可以被遍历的文本树节点
pub trait TextNode: Sized {
    /// 节点名称（用于定位信息）
    fn name(&self) -> &str;
    /// 节点自身文本（位于第一个子节点之前）
    fn text(&self) -> Option<&str>;
    fn set_text(&mut self, text: String);
    /// 尾随文本（位于节点结束之后，属于父节点的内容流）
    fn tail(&self) -> Option<&str>;
    fn set_tail(&mut self, tail: String);
    fn children(&self) -> &[Self];
    fn children_mut(&mut self) -> &mut [Self];
}

/// 槽位类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Text,
    Tail,
}

/// 序列中某个位置对应的槽位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLocation {
    pub index: usize,
    pub kind: SlotKind,
    /// 拥有该槽位的节点名称
    pub node: String,
}

/// 按文档顺序提取所有有效文本
pub fn extract<N: TextNode>(root: &N) -> Vec<String> {
    let mut texts = Vec::new();
    visit(root, &mut |node, kind| {
        let text = match kind {
            SlotKind::Text => node.text(),
            SlotKind::Tail => node.tail(),
        };
        if let Some(text) = text {
            texts.push(text.to_string());
        }
    });
    texts
}

/// 有效槽位数量（等于 `extract(root).len()`）
pub fn slot_count<N: TextNode>(root: &N) -> usize {
    let mut count = 0;
    visit(root, &mut |_, _| count += 1);
    count
}

/// 每个序列位置对应的槽位类型和节点名称
pub fn locate<N: TextNode>(root: &N) -> Vec<SlotLocation> {
    let mut locations = Vec::new();
    visit(root, &mut |node, kind| {
        locations.push(SlotLocation {
            index: locations.len(),
            kind,
            node: node.name().to_string(),
        });
    });
    locations
}

/// 只读遍历：仅对有效槽位调用回调
fn visit<N: TextNode>(node: &N, on_slot: &mut impl FnMut(&N, SlotKind)) {
    if is_eligible_text(node.text()) {
        on_slot(node, SlotKind::Text);
    }
    for child in node.children() {
        visit(child, on_slot);
    }
    if is_eligible_text(node.tail()) {
        on_slot(node, SlotKind::Tail);
    }
}

/// 按文档顺序写回替换文本
///
/// `texts` 的长度必须与 [`slot_count`] 相同，否则返回
/// [`DocError::SlotCountMismatch`]，且树保持不变。
/// `None` 表示保留该槽位原文。
pub fn swap<N: TextNode>(root: &mut N, texts: &[Option<String>]) -> Result<()> {
    let expected = slot_count(root);
    if texts.len() != expected {
        return Err(DocError::SlotCountMismatch {
            expected,
            actual: texts.len(),
        });
    }

    let mut cursor = Replacements { texts, position: 0 };
    swap_node(root, &mut cursor);
    debug_assert_eq!(cursor.position, texts.len());
    Ok(())
}

/// 替换序列游标，每遇到一个有效槽位前进一次
struct Replacements<'a> {
    texts: &'a [Option<String>],
    position: usize,
}

impl<'a> Replacements<'a> {
    fn next(&mut self) -> Option<&'a str> {
        let value = self.texts.get(self.position).and_then(|t| t.as_deref());
        self.position += 1;
        value
    }
}

fn swap_node<N: TextNode>(node: &mut N, cursor: &mut Replacements<'_>) {
    if is_eligible_text(node.text()) {
        if let Some(new_text) = cursor.next() {
            node.set_text(new_text.to_string());
        }
    }
    for child in node.children_mut() {
        swap_node(child, cursor);
    }
    if is_eligible_text(node.tail()) {
        if let Some(new_tail) = cursor.next() {
            node.set_tail(new_tail.to_string());
        }
    }
}
