//! Fixed user-facing text shared by the context loader, the prompt assembler,
//! the session and the page renderer.

/// Returned by the context loader when no knowledge source produced content.
pub const NO_CONTEXT_FALLBACK: &str = "데이터 파일이 없습니다. 일반적인 지식으로 답변하세요.";

/// Section header placed above the plain-text source.
pub const TEXT_SECTION_LABEL: &str = "=== [참고 문서 데이터 (TXT)] ===";

/// Section header placed above the N-Triples rendering of the ontology.
pub const ONTOLOGY_SECTION_LABEL: &str = "=== [온톨로지 구조 데이터 (TTL)] ===";

/// First message of every transcript.
pub const GREETING: &str = "안녕하세요! 온톨로지와 노벨상 아이디어에 대해 무엇이든 물어보세요.";

/// Recorded as the assistant reply when a completion fails.
pub const APOLOGY: &str = "죄송합니다. 답변을 생성하는 중 문제가 발생했습니다.";

/// Banner shown to the user when a completion fails.
pub const COMPLETION_ERROR_BANNER: &str =
    "답변 생성 중 오류가 발생했습니다. 잠시 후 다시 시도해 주세요.";

/// Banner shown when no API key could be resolved at startup.
pub const UNCONFIGURED_BANNER: &str =
    "API 키가 설정되지 않았습니다. `nobelforge set-key` 또는 GEMINI_API_KEY 환경 변수로 설정하세요.";

pub const PAGE_TITLE: &str = "Gemini - 노벨상 제조기";
pub const HEADER_TITLE: &str = "Gemini";
pub const HEADER_SUBTITLE: &str = "온톨로지 수강생들을 위해 노벨상 제조기를 만들었습니다 🎓";
