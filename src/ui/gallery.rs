//! Static "idea card" gallery.

use serde::Serialize;

use crate::ui::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardItem {
    pub category: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub link: &'static str,
}

pub const CARDS: &[CardItem] = &[
    CardItem {
        category: "물리학",
        title: "양자 얽힘으로 연결된 지식 그래프",
        description: "입자 간 상호작용을 트리플로 표현하고, 실험 데이터에서 새로운 관계를 추론해 보세요.",
        icon: "⚛️",
        link: "https://www.nobelprize.org/prizes/physics/",
    },
    CardItem {
        category: "화학",
        title: "촉매 반응 온톨로지로 신소재 예측하기",
        description: "반응물, 촉매, 생성물의 관계를 온톨로지로 정리하면 아직 시도되지 않은 조합이 보입니다.",
        icon: "🧪",
        link: "https://www.nobelprize.org/prizes/chemistry/",
    },
    CardItem {
        category: "생리의학",
        title: "유전자-질병 관계 추론 엔진",
        description: "유전자, 단백질, 질병을 잇는 경로를 그래프로 탐색해 새로운 치료 표적 후보를 찾아봅니다.",
        icon: "🧬",
        link: "https://www.nobelprize.org/prizes/medicine/",
    },
    CardItem {
        category: "경제학",
        title: "행동경제학 개념 지도",
        description: "편향, 휴리스틱, 제도 사이의 인과 관계를 온톨로지로 구조화해 정책 효과를 설명합니다.",
        icon: "📈",
        link: "https://www.nobelprize.org/prizes/economic-sciences/",
    },
    CardItem {
        category: "문학",
        title: "서사 구조 온톨로지",
        description: "인물, 사건, 모티프를 트리플로 기술하고 작품 간의 숨은 연결을 발견해 보세요.",
        icon: "📚",
        link: "https://www.nobelprize.org/prizes/literature/",
    },
    CardItem {
        category: "평화",
        title: "분쟁 해결 사례 지식베이스",
        description: "협상 주체와 합의 조건을 체계적으로 연결해 다음 협상에 쓸 수 있는 패턴을 찾습니다.",
        icon: "🕊️",
        link: "https://www.nobelprize.org/prizes/peace/",
    },
];

/// Renders the cards as a two-column grid.
pub fn render_gallery(cards: &[CardItem]) -> String {
    let mut html = String::from("<div class=\"card-grid\">\n");
    for card in cards {
        html.push_str(&render_card(card));
    }
    html.push_str("</div>\n");
    html
}

fn render_card(card: &CardItem) -> String {
    format!(
        r#"  <div class="program-card">
    <div class="card-content">
      <div class="icon-box">{icon}</div>
      <span class="badge">{category}</span>
      <div class="card-title">{title}</div>
      <div class="card-desc">{description}</div>
    </div>
    <a class="action-btn" href="{link}" target="_blank" rel="noopener">자세히 보기</a>
  </div>
"#,
        icon = escape_html(card.icon),
        category = escape_html(card.category),
        title = escape_html(card.title),
        description = escape_html(card.description),
        link = escape_html(card.link),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_card_is_rendered() {
        let html = render_gallery(CARDS);
        assert_eq!(html.matches("class=\"program-card\"").count(), CARDS.len());
        for card in CARDS {
            assert!(html.contains(card.title));
            assert!(html.contains(card.link));
        }
    }

    #[test]
    fn card_text_is_escaped() {
        let card = CardItem {
            category: "<b>",
            title: "A & B",
            description: "\"quoted\"",
            icon: "x",
            link: "https://example.org/?a=1&b=2",
        };
        let html = render_gallery(&[card]);
        assert!(html.contains("&lt;b&gt;"));
        assert!(html.contains("A &amp; B"));
        assert!(html.contains("&quot;quoted&quot;"));
        assert!(html.contains("href=\"https://example.org/?a=1&amp;b=2\""));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn empty_gallery_is_an_empty_grid() {
        assert_eq!(render_gallery(&[]), "<div class=\"card-grid\">\n</div>\n");
    }
}
