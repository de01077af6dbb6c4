//! 문서 well-formedness 검사

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// 루트 요소가 정확히 하나이고 모든 태그가 올바르게 닫혀 있는지 확인한다.
/// 속성 문법/중복, 엔티티 참조, 허용되지 않는 문자도 거부한다.
/// 스키마(BPMN 구조) 검증은 하지 않는다.
pub fn is_well_formed(text: &str) -> bool {
    if !text.chars().all(is_xml_char) {
        return false;
    }

    let mut reader = Reader::from_str(text);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if !has_valid_attributes(&e) {
                    return false;
                }
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::End(_)) => {
                // 태그 이름 불일치/짝 없는 닫힘 태그는 reader가 Err로 보고한다
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Empty(e)) => {
                if !has_valid_attributes(&e) {
                    return false;
                }
                if depth == 0 {
                    roots += 1;
                }
            }
            Ok(Event::Text(t)) => {
                let bytes: &[u8] = &t;
                if depth == 0 && !bytes.iter().all(u8::is_ascii_whitespace) {
                    return false;
                }
                if t.unescape().is_err() {
                    return false;
                }
            }
            Ok(Event::CData(_)) => {
                if depth == 0 {
                    return false;
                }
            }
            Ok(Event::Eof) => return depth == 0 && roots == 1,
            Ok(_) => {}
            Err(_) => return false,
        }

        if roots > 1 {
            return false;
        }
    }
}

/// 인용 부호, 중복 이름, 값 안의 엔티티 참조 검사
fn has_valid_attributes(start: &BytesStart<'_>) -> bool {
    start.attributes().all(|attr| match attr {
        Ok(attr) => attr.unescape_value().is_ok(),
        Err(_) => false,
    })
}

/// XML 1.0 `Char` 생성 규칙
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}' | '\u{A}' | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}
