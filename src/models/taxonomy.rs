//! 字段分类表
//!
//! 页面上能识别的所有标签：标量字段（标签 + 下一格的值）和表格字段（`data-src-tbl` 属性）

use phf::phf_map;

/// 标量字段分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    /// 分类学信息
    Taxonomic,
    /// 生理与形态
    Physiological,
    /// 生长条件
    GrowthCondition,
}

impl FieldCategory {
    pub const ALL: [FieldCategory; 3] = [
        FieldCategory::Taxonomic,
        FieldCategory::Physiological,
        FieldCategory::GrowthCondition,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldCategory::Taxonomic => "taxonomic",
            FieldCategory::Physiological => "physiological",
            FieldCategory::GrowthCondition => "growth condition",
        }
    }

    /// 该分类下的全部标签
    pub fn labels(self) -> impl Iterator<Item = &'static str> {
        SCALAR_FIELDS
            .entries()
            .filter(move |(_, category)| **category == self)
            .map(|(label, _)| *label)
    }
}

impl std::fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 标签 -> 分类
static SCALAR_FIELDS: phf::Map<&'static str, FieldCategory> = phf_map! {
    "Domain" => FieldCategory::Taxonomic,
    "Phylum" => FieldCategory::Taxonomic,
    "Class" => FieldCategory::Taxonomic,
    "Order" => FieldCategory::Taxonomic,
    "Family" => FieldCategory::Taxonomic,
    "Genus" => FieldCategory::Taxonomic,

    "Gram stain" => FieldCategory::Physiological,
    "Cell length" => FieldCategory::Physiological,
    "Cell width" => FieldCategory::Physiological,
    "Cell shape" => FieldCategory::Physiological,
    "Motility" => FieldCategory::Physiological,
    "Type of hemolysis" => FieldCategory::Physiological,
    "Colony color" => FieldCategory::Physiological,
    "Colony size" => FieldCategory::Physiological,
    "Colony shape" => FieldCategory::Physiological,
    "Incubation period" => FieldCategory::Physiological,
    "Ability of spore formation" => FieldCategory::Physiological,
    "Type of spore" => FieldCategory::Physiological,
    "Multicellular complex forming ability" => FieldCategory::Physiological,
    "Name of produced compound" => FieldCategory::Physiological,
    "Murein short key" => FieldCategory::Physiological,
    "Murein types" => FieldCategory::Physiological,
    "Oxygen tolerance" => FieldCategory::Physiological,
    "Observation" => FieldCategory::Physiological,
    "Enzyme" => FieldCategory::Physiological,
    "Nutrition type" => FieldCategory::Physiological,

    "Temperature range" => FieldCategory::GrowthCondition,
    "pH" => FieldCategory::GrowthCondition,
};

/// 表格字段，按 `data-src-tbl` 属性值识别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabularTrait {
    /// 抗生素敏感性
    AntibioticSusceptibility,
    /// 嗜盐性
    Halophily,
    /// 代谢底物利用
    MetabolicUtilization,
    /// 代谢产物
    MetabolicProduction,
    /// 酶活性
    EnzymaticActivity,
}

impl TabularTrait {
    pub const ALL: [TabularTrait; 5] = [
        TabularTrait::AntibioticSusceptibility,
        TabularTrait::Halophily,
        TabularTrait::MetabolicUtilization,
        TabularTrait::MetabolicProduction,
        TabularTrait::EnzymaticActivity,
    ];

    /// 页面上的属性值，同时作为输出的 key
    pub fn id(self) -> &'static str {
        match self {
            TabularTrait::AntibioticSusceptibility => "met_antibiotica",
            TabularTrait::Halophily => "halophily",
            TabularTrait::MetabolicUtilization => "met_util",
            TabularTrait::MetabolicProduction => "met_production",
            TabularTrait::EnzymaticActivity => "enzymes",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}

impl std::fmt::Display for TabularTrait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// 字段分类表（只读）
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldTaxonomy;

impl FieldTaxonomy {
    pub fn new() -> Self {
        Self
    }

    /// 若是已知标签，返回表中的 `'static` 版本
    pub fn scalar_key(&self, text: &str) -> Option<&'static str> {
        SCALAR_FIELDS.get_key(text).copied()
    }

    pub fn category_of(&self, label: &str) -> Option<FieldCategory> {
        SCALAR_FIELDS.get(label).copied()
    }

    pub fn is_scalar(&self, label: &str) -> bool {
        SCALAR_FIELDS.contains_key(label)
    }

    pub fn tabular_traits(&self) -> &'static [TabularTrait] {
        &TabularTrait::ALL
    }

    /// key 是否属于任意一类已知字段
    pub fn recognizes(&self, key: &str) -> bool {
        self.is_scalar(key) || TabularTrait::from_id(key).is_some()
    }

    pub fn scalar_count(&self) -> usize {
        SCALAR_FIELDS.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_lookup() {
        let taxonomy = FieldTaxonomy::new();
        assert_eq!(taxonomy.category_of("Gram stain"), Some(FieldCategory::Physiological));
        assert_eq!(taxonomy.category_of("Genus"), Some(FieldCategory::Taxonomic));
        assert_eq!(taxonomy.category_of("pH"), Some(FieldCategory::GrowthCondition));
        assert_eq!(taxonomy.scalar_key("Motility"), Some("Motility"));
        // 大小写敏感
        assert!(!taxonomy.is_scalar("gram stain"));
    }

    #[test]
    fn test_categories_partition_scalar_set() {
        let taxonomy = FieldTaxonomy::new();
        let total: usize = FieldCategory::ALL.iter().map(|c| c.labels().count()).sum();
        assert_eq!(total, taxonomy.scalar_count());
        assert_eq!(FieldCategory::Taxonomic.labels().count(), 6);
        assert_eq!(FieldCategory::GrowthCondition.labels().count(), 2);
    }

    #[test]
    fn test_tabular_ids_roundtrip() {
        let taxonomy = FieldTaxonomy::new();
        for t in taxonomy.tabular_traits() {
            assert_eq!(TabularTrait::from_id(t.id()), Some(*t));
            assert!(taxonomy.recognizes(t.id()));
        }
        assert!(TabularTrait::from_id("met_unknown").is_none());
        assert!(!taxonomy.recognizes("Strain designation"));
    }
}
