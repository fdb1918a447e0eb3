/// XML 元素树
///
/// 采用 text/tail 模型：
/// - **text**: 元素开始标签之后、第一个子节点之前的文本
/// - **tail**: 元素结束标签之后的文本，属于父元素的内容流
///
/// ```xml
/// <div>
///   TEXT HERE          <!-- div 的 text -->
///   <span>inner</span>
///   TAIL HERE          <!-- span 的 tail -->
/// </div>
/// ```
///
/// 注释和处理指令也作为子节点保存，只拥有 tail 槽位。
use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::encoding::Decoder;
use quick_xml::escape::{partial_escape, unescape_with};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::utils::Result;
use crate::walker::TextNode;

/// 元素最大嵌套深度，超过时解析失败（与 libxml2 的默认限制相同）
pub const MAX_DEPTH: usize = 256;

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    /// `<!--content-->`，content 存放在 text 中
    Comment,
    /// `<?content?>`，content 存放在 text 中
    ProcessingInstruction,
}

/// 树节点
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    pub kind: NodeKind,
    /// 限定名（保留原始前缀，如 `x:t`）
    pub name: String,
    /// 属性（保留原始顺序，值为反转义后的文本）
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// 创建空元素
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            tail: None,
            children: Vec::new(),
        }
    }

    pub fn comment(content: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Comment,
            name: String::new(),
            attributes: Vec::new(),
            text: Some(content.into()),
            tail: None,
            children: Vec::new(),
        }
    }

    pub fn processing_instruction(content: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::ProcessingInstruction,
            ..Self::comment(content)
        }
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// 获取属性值
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 设置属性值（已存在则覆盖）
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    /// 按子节点索引路径查找后代
    pub fn descendant(&self, path: &[usize]) -> Option<&XmlNode> {
        path.iter().try_fold(self, |node, &i| node.children.get(i))
    }

    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut XmlNode> {
        path.iter().try_fold(self, |node, &i| node.children.get_mut(i))
    }

    fn from_start(
        start: &BytesStart<'_>,
        decoder: Decoder,
        entities: &Entities,
    ) -> std::result::Result<Self, String> {
        let name = decode(decoder, start.name().as_ref(), "element name")?.into_owned();
        let mut node = Self::element(name);

        for attr in start.attributes() {
            let attr = attr.map_err(|e| format!("invalid attribute in <{}>: {}", node.name, e))?;
            let key = decode(decoder, attr.key.as_ref(), "attribute name")?.into_owned();
            let raw = decode(decoder, &attr.value, "attribute value")?;
            let value = unescape_text(&normalize_newlines(&raw), entities)
                .map_err(|e| format!("invalid value for attribute {}: {}", key, e))?
                .into_owned();
            node.attributes.push((key, value));
        }

        Ok(node)
    }

    fn append_text(&mut self, content: &str) {
        let slot = match self.children.last_mut() {
            Some(last) => &mut last.tail,
            None => &mut self.text,
        };
        slot.get_or_insert_with(String::new).push_str(content);
    }
}

impl TextNode for XmlNode {
    fn name(&self) -> &str {
        &self.name
    }

    /// 注释和处理指令的内容不是可翻译文本
    fn text(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Element => self.text.as_deref(),
            NodeKind::Comment | NodeKind::ProcessingInstruction => None,
        }
    }

    fn set_text(&mut self, text: String) {
        if self.is_element() {
            self.text = Some(text);
        }
    }

    fn tail(&self) -> Option<&str> {
        self.tail.as_deref()
    }

    fn set_tail(&mut self, tail: String) {
        self.tail = Some(tail);
    }

    fn children(&self) -> &[Self] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut [Self] {
        &mut self.children
    }
}

/// 根元素之外的顶层内容
#[derive(Debug, Clone, PartialEq)]
pub enum Misc {
    DocType(String),
    Comment(String),
    ProcessingInstruction(String),
}

/// XML 声明中需要保留的字段（编码固定输出为 UTF-8）
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub version: String,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            standalone: None,
        }
    }
}

/// 完整的 XML 文档
#[derive(Debug, Clone, PartialEq)]
pub struct XmlTree {
    pub declaration: Declaration,
    pub prolog: Vec<Misc>,
    pub root: XmlNode,
    pub epilog: Vec<Misc>,
}

impl XmlTree {
    pub fn new(root: XmlNode) -> Self {
        Self {
            declaration: Declaration::default(),
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// 解析 XML 字节流
    ///
    /// 返回的错误是人类可读的原因描述，由调用方包装为格式错误。
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();

        let mut declaration = Declaration::default();
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut entities = Entities::new();
        let mut root: Option<XmlNode> = None;
        let mut stack: Vec<XmlNode> = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| format!("error at position {}: {}", reader.buffer_position(), e))?;
            // 编码由 BOM 或 XML 声明决定，声明之后的事件才能拿到正确的解码器
            let decoder = reader.decoder();

            match event {
                Event::Decl(decl) => declaration = read_declaration(&decl)?,
                Event::Start(start) => {
                    if root.is_some() && stack.is_empty() {
                        return Err("multiple root elements".to_string());
                    }
                    check_depth(stack.len() + 1)?;
                    stack.push(XmlNode::from_start(&start, decoder, &entities)?);
                }
                Event::Empty(start) => {
                    check_depth(stack.len() + 1)?;
                    let node = XmlNode::from_start(&start, decoder, &entities)?;
                    attach(node, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| "unexpected closing tag".to_string())?;
                    attach(node, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let raw = decode(decoder, &text, "text content")?;
                    let normalized = normalize_newlines(&raw);
                    let content = unescape_text(&normalized, &entities)
                        .map_err(|e| format!("invalid text content: {}", e))?;
                    append_text(&content, &mut stack)?;
                }
                Event::CData(cdata) => {
                    let raw = decode(decoder, &cdata, "CDATA content")?;
                    append_text(&normalize_newlines(&raw), &mut stack)?;
                }
                Event::Comment(comment) => {
                    let content = normalize_newlines(&decode(decoder, &comment, "comment")?).into_owned();
                    match stack.is_empty() {
                        true if root.is_none() => prolog.push(Misc::Comment(content)),
                        true => epilog.push(Misc::Comment(content)),
                        false => attach(XmlNode::comment(content), &mut stack, &mut root)?,
                    }
                }
                Event::PI(instruction) => {
                    let content =
                        normalize_newlines(&decode(decoder, &instruction, "processing instruction")?).into_owned();
                    match stack.is_empty() {
                        true if root.is_none() => prolog.push(Misc::ProcessingInstruction(content)),
                        true => epilog.push(Misc::ProcessingInstruction(content)),
                        false => attach(
                            XmlNode::processing_instruction(content),
                            &mut stack,
                            &mut root,
                        )?,
                    }
                }
                Event::DocType(doctype) => {
                    let content = decode(decoder, &doctype, "DOCTYPE")?.into_owned();
                    for (name, value) in internal_entities(&content) {
                        // 实体值中的字符引用和预定义实体在声明时展开
                        let expanded = unescape_with(&value, predefined_entity).map(Cow::into_owned);
                        entities.entry(name).or_insert(expanded.unwrap_or(value));
                    }
                    prolog.push(Misc::DocType(content));
                }
                Event::Eof => break,
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(format!("unclosed element <{}>", stack[stack.len() - 1].name));
        }
        let root = root.ok_or_else(|| "document has no root element".to_string())?;

        Ok(Self {
            declaration,
            prolog,
            root,
            epilog,
        })
    }

    /// 序列化为带 XML 声明的 UTF-8 字节流
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());

        writer.write_event(Event::Decl(BytesDecl::new(
            &self.declaration.version,
            Some("UTF-8"),
            self.declaration.standalone.as_deref(),
        )))?;
        writer.get_mut().push(b'\n');

        for misc in &self.prolog {
            write_misc(&mut writer, misc)?;
            writer.get_mut().push(b'\n');
        }

        write_node(&mut writer, &self.root)?;

        for misc in &self.epilog {
            writer.get_mut().push(b'\n');
            write_misc(&mut writer, misc)?;
        }

        Ok(writer.into_inner())
    }
}

fn read_declaration(decl: &BytesDecl<'_>) -> std::result::Result<Declaration, String> {
    let version = decl
        .version()
        .map_err(|e| format!("invalid XML declaration: {}", e))?;
    let standalone = match decl.standalone() {
        Some(value) => Some(
            value
                .map(|v| String::from_utf8_lossy(&v).into_owned())
                .map_err(|e| format!("invalid XML declaration: {}", e))?,
        ),
        None => None,
    };

    Ok(Declaration {
        version: String::from_utf8_lossy(&version).into_owned(),
        standalone,
    })
}

/// 内部 DTD 子集中声明的通用实体
type Entities = HashMap<String, String>;

fn check_depth(depth: usize) -> std::result::Result<(), String> {
    if depth > MAX_DEPTH {
        return Err(format!("elements nested deeper than {} levels", MAX_DEPTH));
    }
    Ok(())
}

fn decode<'b>(decoder: Decoder, bytes: &'b [u8], what: &str) -> std::result::Result<Cow<'b, str>, String> {
    decoder
        .decode(bytes)
        .map_err(|e| format!("invalid {}: {}", what, e))
}

/// 行尾规范化：`\r\n` 和单独的 `\r` 都变为 `\n`（字符引用 `&#13;` 不受影响）
fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// 反转义预定义实体、字符引用和内部 DTD 声明的实体
fn unescape_text<'a>(raw: &'a str, entities: &Entities) -> std::result::Result<Cow<'a, str>, String> {
    unescape_with(raw, |name| match predefined_entity(name) {
        Some(value) => Some(value),
        None => entities.get(name).map(String::as_str),
    })
    .map_err(|e| e.to_string())
}

fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// 从 DOCTYPE 内容中找出 `<!ENTITY name "value">` 形式的内部实体
///
/// 参数实体和外部实体（SYSTEM/PUBLIC）被跳过。
fn internal_entities(doctype: &str) -> Vec<(String, String)> {
    const DECL: &str = "<!ENTITY";

    let mut entities = Vec::new();
    let mut rest = doctype;
    while let Some(start) = rest.find(DECL) {
        rest = rest[start + DECL.len()..].trim_start();
        if rest.starts_with('%') {
            continue;
        }

        let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (name, after) = rest.split_at(name_end);
        let after = after.trim_start();
        rest = after;

        let Some(quote) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        match after[1..].find(quote) {
            Some(end) => {
                entities.push((name.to_string(), after[1..1 + end].to_string()));
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    entities
}

/// 把完成的节点挂到父节点上，或作为根节点
fn attach(
    node: XmlNode,
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if !node.is_element() => {}
        None if root.is_some() => return Err("multiple root elements".to_string()),
        None => *root = Some(node),
    }
    Ok(())
}

fn append_text(content: &str, stack: &mut [XmlNode]) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(node) => node.append_text(content),
        None if content.trim().is_empty() => {}
        None => return Err("text outside of the root element".to_string()),
    }
    Ok(())
}

fn write_misc(writer: &mut Writer<Vec<u8>>, misc: &Misc) -> Result<()> {
    match misc {
        Misc::DocType(content) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(content.as_str())))?;
        }
        Misc::Comment(content) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(content.as_str())))?;
        }
        Misc::ProcessingInstruction(content) => {
            write_raw(writer, &format!("<?{}?>", content));
        }
    }
    Ok(())
}

fn write_raw(writer: &mut Writer<Vec<u8>>, raw: &str) {
    writer.get_mut().extend_from_slice(raw.as_bytes());
}

fn write_text(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<()> {
    let escaped: Cow<'_, str> = partial_escape(text);
    writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node.kind {
        NodeKind::Element => {
            let mut start = BytesStart::new(node.name.as_str());
            for (key, value) in &node.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }

            let text = node.text.as_deref().filter(|t| !t.is_empty());
            if text.is_none() && node.children.is_empty() {
                writer.write_event(Event::Empty(start))?;
            } else {
                writer.write_event(Event::Start(start))?;
                if let Some(text) = text {
                    write_text(writer, text)?;
                }
                for child in &node.children {
                    write_node(writer, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(node.name.as_str())))?;
            }
        }
        NodeKind::Comment => {
            let content = node.text.as_deref().unwrap_or_default();
            writer.write_event(Event::Comment(BytesText::from_escaped(content)))?;
        }
        NodeKind::ProcessingInstruction => {
            write_raw(writer, &format!("<?{}?>", node.text.as_deref().unwrap_or_default()));
        }
    }

    if let Some(tail) = node.tail.as_deref().filter(|t| !t.is_empty()) {
        write_text(writer, tail)?;
    }
    Ok(())
}
