//! Grounding context injected as the first system message of every exchange.
//!
//! The knowledge base is a handful of curated sections, each tagged with
//! keywords. Sections whose tags occur in the user's query are selected; when
//! none match, a default overview set is used.

use serde::{Deserialize, Serialize};

/// Reply language for the grounding directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    En,
    /// Arabic.
    Ar,
}

impl Language {
    /// Detect the language of `text`: Arabic when it contains any character
    /// from the Arabic block, English otherwise.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
            Language::Ar
        } else {
            Language::En
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "ar" | "arabic" => Ok(Self::Ar),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

/// One curated knowledge section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSection {
    /// Stable identifier.
    pub id: String,
    /// Keywords matched against the lower-cased query.
    pub tags: Vec<String>,
    /// English text.
    pub en: String,
    /// Arabic text.
    pub ar: String,
}

impl KnowledgeSection {
    /// Create a section.
    pub fn new(
        id: impl Into<String>,
        tags: &[&str],
        en: impl Into<String>,
        ar: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            en: en.into(),
            ar: ar.into(),
        }
    }

    fn text(&self, language: Language) -> &str {
        match language {
            Language::En => &self.en,
            Language::Ar => &self.ar,
        }
    }

    fn matches(&self, query: &str) -> bool {
        self.tags.iter().any(|tag| query.contains(&tag.to_lowercase()))
    }
}

const DIRECTIVE_EN: &str = "You are an expert on Smart Shelf. Use the following knowledge to answer accurately and confidently. Structure the answer (bullets/newlines) and reply in the user's language. When asked about the platform, explain each part clearly.";
const DIRECTIVE_AR: &str = "أنت خبير بمنصة الرف الذكي. استخدم المعرفة التالية للإجابة بدقة وثقة. اجعل الإجابة منظمة وقابلة للقراءة (نقاط/أسطر جديدة)، وبنفس لغة المستخدم. إذا سُئلت عن تفاصيل المنصة، اشرح كل جزء باختصار واضح.";

/// Curated knowledge used to ground replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    sections: Vec<KnowledgeSection>,
    defaults: Vec<String>,
}

impl KnowledgeBase {
    /// Create a knowledge base from sections. `defaults` lists the section
    /// ids used when no tag matches.
    #[must_use]
    pub fn new(sections: Vec<KnowledgeSection>, defaults: &[&str]) -> Self {
        Self {
            sections,
            defaults: defaults.iter().map(|d| (*d).to_string()).collect(),
        }
    }

    /// Number of sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether there are no sections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections selected for `query`.
    #[must_use]
    pub fn select(&self, query: &str) -> Vec<&KnowledgeSection> {
        let query = query.to_lowercase();
        let matched: Vec<&KnowledgeSection> =
            self.sections.iter().filter(|s| s.matches(&query)).collect();
        if !matched.is_empty() {
            return matched;
        }
        self.sections
            .iter()
            .filter(|s| self.defaults.contains(&s.id))
            .collect()
    }

    /// Render the grounding system message for `query`.
    ///
    /// `preferred` overrides language detection.
    #[must_use]
    pub fn build_context(&self, query: &str, preferred: Option<Language>) -> String {
        let language = preferred.unwrap_or_else(|| Language::detect(query));
        let directive = match language {
            Language::En => DIRECTIVE_EN,
            Language::Ar => DIRECTIVE_AR,
        };
        let lines: Vec<&str> = self
            .select(query)
            .into_iter()
            .map(|s| s.text(language))
            .collect();

        format!("{directive}\n\nKnowledge:\n- {}", lines.join("\n- "))
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        let sections = vec![
            KnowledgeSection::new(
                "overview",
                &["smart shelf", "الرف الذكي", "المنصة", "overview"],
                "Smart Shelf is a modern library assistant. It helps users quickly find books and provides an AI assistant with Arabic and English support.",
                "الرف الذكي منصة حديثة لإدارة المكتبات. تهدف إلى تسريع العثور على الكتب وتقديم مساعد ذكي يعتمد على الذكاء الاصطناعي مع دعم العربية والإنجليزية.",
            ),
            KnowledgeSection::new(
                "features",
                &["features", "مميزات", "خصائص"],
                "Features: AI-powered search, voice search (Arabic/English), interactive shelf map, user authentication, and chat with saved conversations.",
                "المميزات: بحث مدعوم بالذكاء الاصطناعي، بحث صوتي (عربي/إنجليزي)، خريطة رف تفاعلية لتحديد الموقع، مصادقة المستخدم، ودردشة مع حفظ المحادثات.",
            ),
            KnowledgeSection::new(
                "pages",
                &["pages", "صفحات", "navigation", "التنقل"],
                "Key pages: Home, Search, Results, Book Details, Shelf Map, AI Assistant, and Admin.",
                "أهم الصفحات: الصفحة الرئيسية، البحث، النتائج، تفاصيل الكتاب، خريطة الرف، المساعد الذكي، والإدارة.",
            ),
            KnowledgeSection::new(
                "search",
                &["search", "البحث", "voice", "الصوت"],
                "Search: Supports text and voice with localized UI messages and quick listening/processing cues.",
                "البحث: يدعم نصاً وصوتاً مع رسائل واجهة مترجمة وتجربة سريعة للاستماع والمعالجة.",
            ),
            KnowledgeSection::new(
                "shelf",
                &["shelf", "خريطة الرف", "الموقع"],
                "Shelf Map: An interactive view of book locations for navigating shelves visually.",
                "خريطة الرف: واجهة تفاعلية لعرض مواقع الكتب والانتقال على الرفوف باستخدام مخطط مرئي.",
            ),
            KnowledgeSection::new(
                "chat",
                &["chat", "الدردشة", "assistant", "المساعد"],
                "Chat: Replies stream in gradually with a typing indicator; a click skips straight to the full answer.",
                "الدردشة: تظهر الردود بشكل متدرّج مع مؤشّر كتابة، ويمكن التخطي بالنقر لعرض الإجابة كاملة.",
            ),
            KnowledgeSection::new(
                "admin",
                &["admin", "الإدارة"],
                "Admin: Dashboard to add books and track loans and analytics.",
                "الإدارة: لوحة تحكم لإضافة الكتب ومتابعة الإعارات والتحليلات.",
            ),
        ];
        Self::new(sections, &["overview", "features", "pages"])
    }
}
