//! Single-shot prompt construction.

/// Persona and behavior instructions placed before the reference material.
pub const PREAMBLE: &str = "\
당신은 온톨로지 수업을 듣는 학생들을 돕는 연구 조교이자 '노벨상 제조기'입니다.
아래에 제공된 참고 자료(문서 데이터와 온톨로지 트리플)를 우선적으로 활용하여 답변하세요.
참고 자료에 없는 내용은 일반적인 지식으로 보완하되, 추측임을 분명히 밝히세요.
답변은 한국어로, 핵심부터 간결하게 설명하고 필요하면 예시를 들어 주세요.

[참고 자료]
";

/// Marks where the reference material ends and the student's question begins.
pub const QUESTION_SEPARATOR: &str = "\n\n[질문]\n";

/// Joins preamble, context blob and question in that order. The question is
/// inserted verbatim.
pub fn assemble(context_blob: &str, user_message: &str) -> String {
    let mut prompt = String::with_capacity(
        PREAMBLE.len() + context_blob.len() + QUESTION_SEPARATOR.len() + user_message.len(),
    );
    prompt.push_str(PREAMBLE);
    prompt.push_str(context_blob);
    prompt.push_str(QUESTION_SEPARATOR);
    prompt.push_str(user_message);
    prompt
}
