//! 字段提取服务 - 业务能力层
//!
//! 只负责"一页 HTML -> 有序的 Fact 列表"，不做网络和文件 I/O
//!
//! 页面上有两种完全不同的结构，分两遍扫描：
//! 1. 标量字段：`<td>标签</td><td>值</td>`，按文档顺序用两态状态机配对
//! 2. 表格字段：带 `data-src-tbl` 属性的单元格，值在所在行的固定位置

use crate::error::ExtractError;
use crate::models::{Fact, FieldTaxonomy, TabularTrait};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// 菌株名称所在段落的路径
pub const SUBJECT_PATH: &str = "body main div div div div div div div p";

/// 第几个匹配段落包含菌株名称
const SUBJECT_PARAGRAPH_INDEX: usize = 3;

/// 表格行中测量值的位置
pub const TABULAR_VALUE_OFFSET: usize = 3;

/// 表格行中"是否表达"标记的位置
pub const TABULAR_FLAG_OFFSET: usize = 5;

/// 扫描状态，每页重新开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    AwaitingKey,
    AwaitingValue(&'static str),
}

/// 单页提取结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// 菌株名称
    pub subject: String,
    /// 菌株标记 + 各字段，按文档顺序
    pub facts: Vec<Fact>,
    /// 被跳过的表格行
    pub malformed_tables: Vec<ExtractError>,
}

impl Extraction {
    pub fn into_facts(self) -> Vec<Fact> {
        self.facts
    }
}

/// 字段提取器
///
/// 职责：
/// - 找出菌株名称
/// - 标量字段配对
/// - 表格字段按固定位置读取
pub struct Extractor {
    taxonomy: FieldTaxonomy,
    subject_paragraphs: Selector,
    subject_span: Selector,
    cells: Selector,
    tables: Selector,
    tabular: Vec<(TabularTrait, Selector)>,
}

impl Extractor {
    /// 创建新的提取器
    pub fn new() -> Self {
        let taxonomy = FieldTaxonomy::new();
        let tabular = taxonomy
            .tabular_traits()
            .iter()
            .map(|t| (*t, static_selector(&format!("[data-src-tbl=\"{}\"]", t.id()))))
            .collect();

        Self {
            taxonomy,
            subject_paragraphs: static_selector(SUBJECT_PATH),
            subject_span: static_selector("span"),
            cells: static_selector("td"),
            tables: static_selector("table"),
            tabular,
        }
    }

    /// 解析 HTML 文本并提取
    pub fn extract_html(&self, html: &str) -> Result<Extraction, ExtractError> {
        let document = Html::parse_document(html);
        self.extract(&document)
    }

    /// 提取一页的全部字段
    ///
    /// 找不到菌株名称时整页作废，返回 `MalformedPage`
    pub fn extract(&self, document: &Html) -> Result<Extraction, ExtractError> {
        let subject = self.subject(document)?;

        let mut extraction = Extraction {
            facts: vec![Fact::subject(subject.clone())],
            subject,
            malformed_tables: Vec::new(),
        };

        self.scan_scalar_fields(document, &mut extraction);
        self.scan_tabular_fields(document, &mut extraction);

        debug!(
            "[{}] 提取到 {} 条数据, 跳过 {} 个表格行",
            extraction.subject,
            extraction.facts.len() - 1,
            extraction.malformed_tables.len()
        );

        Ok(extraction)
    }

    /// 读取菌株名称
    pub fn subject(&self, document: &Html) -> Result<String, ExtractError> {
        let malformed = || ExtractError::MalformedPage {
            selector: format!("{} [{}] span", SUBJECT_PATH, SUBJECT_PARAGRAPH_INDEX),
        };

        let paragraph = document
            .select(&self.subject_paragraphs)
            .nth(SUBJECT_PARAGRAPH_INDEX)
            .ok_or_else(malformed)?;
        let span = paragraph.select(&self.subject_span).next().ok_or_else(malformed)?;

        let name = element_text(span).trim().to_string();
        if name.is_empty() {
            return Err(malformed());
        }
        Ok(name)
    }

    fn scan_scalar_fields(&self, document: &Html, extraction: &mut Extraction) {
        let mut state = ScanState::AwaitingKey;

        for cell in document.select(&self.cells) {
            let text = element_text(cell);
            state = match state {
                ScanState::AwaitingKey => match self.taxonomy.scalar_key(text.trim()) {
                    Some(key) => ScanState::AwaitingValue(key),
                    None => ScanState::AwaitingKey,
                },
                ScanState::AwaitingValue(key) => {
                    extraction
                        .facts
                        .push(Fact::field(&extraction.subject, key, &text));
                    ScanState::AwaitingKey
                }
            };
        }

        if let ScanState::AwaitingValue(key) = state {
            debug!("[{}] 字段 {} 后没有值，已丢弃", extraction.subject, key);
        }
    }

    fn scan_tabular_fields(&self, document: &Html, extraction: &mut Extraction) {
        for table in document.select(&self.tables) {
            for (trait_id, selector) in &self.tabular {
                for matched in table.select(selector) {
                    match tabular_value(matched, *trait_id) {
                        Ok(value) => extraction.facts.push(Fact::field(
                            &extraction.subject,
                            trait_id.id(),
                            &value,
                        )),
                        Err(e) => {
                            warn!("[{}] 跳过表格行: {}", extraction.subject, e);
                            extraction.malformed_tables.push(e);
                        }
                    }
                }
            }
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// 读取表格行的值：父元素全部后代元素中第 3 个和第 5 个的文本直接拼接
///
/// 页面改版时只需要修改这里
///
/// # 参数
/// - `matched`: 带 `data-src-tbl` 属性的元素
/// - `trait_id`: 该元素对应的表格类型
///
/// # 返回
/// 拼接后的值；后代元素不足时返回 `MalformedTable`
pub fn tabular_value(matched: ElementRef<'_>, trait_id: TabularTrait) -> Result<String, ExtractError> {
    let columns: Vec<ElementRef<'_>> = match matched.parent().and_then(ElementRef::wrap) {
        Some(parent) => parent.descendants().skip(1).filter_map(ElementRef::wrap).collect(),
        None => Vec::new(),
    };

    match (columns.get(TABULAR_VALUE_OFFSET), columns.get(TABULAR_FLAG_OFFSET)) {
        (Some(value), Some(flag)) => Ok(element_text(*value) + &element_text(*flag)),
        _ => Err(ExtractError::MalformedTable {
            trait_id: trait_id.id().to_string(),
            required: TABULAR_FLAG_OFFSET + 1,
            found: columns.len(),
        }),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

// 选择器都是常量字符串
fn static_selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("无效的选择器 {}: {:?}", css, e))
}
