//! 라인 분류기 -- Pi-hole 질의 로그 한 줄을 구조화된 이벤트로 변환
//!
//! # 인식하는 라인
//! ```text
//! Oct  4 14:18:46: query[A] example.com from 192.168.1.100     -> Query
//! Oct  4 14:18:47: gravity blocked ads.example.com is 0.0.0.0  -> Block (직전 질의의 주소)
//! Oct  4 14:18:47: forwarded example.com to 1.1.1.1            -> 없음
//! ```
//!
//! 분류기 자체는 상태가 없고, 소스별 연관 상태는 호출자가 [`SourceState`]로 넘깁니다.
//! I/O나 네트워크 부수 효과가 없습니다.

use std::net::IpAddr;

use dnstail_core::config::DEFAULT_BLOCK_PHRASES;
use dnstail_core::event::ParsedEvent;
use regex::Regex;

use crate::error::LogStreamError;
use crate::state::SourceState;

/// 질의 라인 패턴
///
/// `query[TYPE]` 뒤 어딘가에 오는 `from <address>`가 라인 끝에 고정되어야 합니다.
/// 1번 그룹은 `from` 앞뒤 공백을 포함한 구분자, 2번 그룹은 주소 토큰입니다.
const QUERY_PATTERN: &str = r"query\[[^\]]*\].*?(\s+from\s+)(\S+)$";

/// 라인 분류기
#[derive(Debug, Clone)]
pub struct LineClassifier {
    /// 질의 라인 정규식
    query_re: Regex,
    /// 소문자로 정규화된 차단 문구
    block_phrases: Vec<String>,
}

impl LineClassifier {
    /// 차단 문구 목록으로 분류기를 생성합니다.
    ///
    /// 빈 문구는 무시되며, 남는 문구가 없으면 에러를 반환합니다.
    pub fn new<I, S>(block_phrases: I) -> Result<Self, LogStreamError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let block_phrases: Vec<String> = block_phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        if block_phrases.is_empty() {
            return Err(LogStreamError::Config {
                field: "block_phrases".to_owned(),
                reason: "at least one non-empty phrase is required".to_owned(),
            });
        }

        Ok(Self {
            query_re: Regex::new(QUERY_PATTERN)?,
            block_phrases,
        })
    }

    /// 기본 차단 문구로 분류기를 생성합니다.
    pub fn with_defaults() -> Result<Self, LogStreamError> {
        Self::new(DEFAULT_BLOCK_PHRASES)
    }

    /// 한 줄을 분류합니다.
    ///
    /// - 질의 라인: `state.last_query_address`를 갱신하고 `Query`를 반환
    /// - 차단 라인: 직전 질의가 있으면 그 주소로 `Block`을 반환, 없으면 `None`
    /// - 그 외: `None` (미분류 라인의 노출 여부는 호출자가 결정)
    pub fn classify(&self, line: &str, state: &mut SourceState) -> Option<ParsedEvent> {
        if let Some((description, address)) = self.match_query(line) {
            state.last_query_address = Some(address.to_owned());
            return Some(ParsedEvent::Query {
                description: description.to_owned(),
                address: address.to_owned(),
            });
        }

        if self.is_block_line(line) {
            return state
                .last_query_address
                .as_ref()
                .map(|address| ParsedEvent::Block {
                    description: line.to_owned(),
                    address: address.clone(),
                });
        }

        None
    }

    /// 차단/거부 문구를 포함하는지 확인합니다 (대소문자 무시).
    pub fn is_block_line(&self, line: &str) -> bool {
        let lowered = line.to_lowercase();
        self.block_phrases.iter().any(|p| lowered.contains(p.as_str()))
    }

    /// 질의 라인이면 (본문, 주소)를 반환합니다.
    ///
    /// 본문은 `from` 앞의 공백 직전까지입니다. 주소 토큰이 IPv4/IPv6로
    /// 파싱되지 않으면 질의 라인이 아닙니다.
    fn match_query<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let caps = self.query_re.captures(line)?;
        let separator = caps.get(1)?;
        let address = caps.get(2)?.as_str();

        if address.parse::<IpAddr>().is_err() {
            return None;
        }

        Some((&line[..separator.start()], address))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const QUERY_LINE: &str = "Oct  4 14:18:46: query[A] example.com from 192.168.1.100";
    const BLOCK_LINE: &str = "Oct  4 14:18:47: gravity blocked ads.example.com is 0.0.0.0";

    #[test]
    fn classifies_query_line() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        let event = classifier.classify(QUERY_LINE, &mut state).unwrap();

        assert_eq!(
            event,
            ParsedEvent::Query {
                description: "Oct  4 14:18:46: query[A] example.com".to_owned(),
                address: "192.168.1.100".to_owned(),
            }
        );
        assert_eq!(state.last_query_address.as_deref(), Some("192.168.1.100"));
    }

    #[test]
    fn block_borrows_previous_query_address() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        classifier.classify(QUERY_LINE, &mut state);
        let event = classifier.classify(BLOCK_LINE, &mut state).unwrap();

        assert_eq!(
            event,
            ParsedEvent::Block {
                description: BLOCK_LINE.to_owned(),
                address: "192.168.1.100".to_owned(),
            }
        );
    }

    #[test]
    fn orphan_block_yields_nothing() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        for _ in 0..3 {
            assert!(classifier.classify(BLOCK_LINE, &mut state).is_none());
        }
        assert!(state.last_query_address.is_none());
    }

    #[test]
    fn block_survives_intervening_noise() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        classifier.classify(QUERY_LINE, &mut state);
        for noise in [
            "Oct  4 14:18:46: forwarded example.com to 1.1.1.1",
            "Oct  4 14:18:46: reply example.com is 93.184.216.34",
            "Oct  4 14:18:46: cached example.com is 93.184.216.34",
        ] {
            assert!(classifier.classify(noise, &mut state).is_none());
        }

        let event = classifier.classify(BLOCK_LINE, &mut state).unwrap();
        assert_eq!(event.address(), Some("192.168.1.100"));
    }

    #[test]
    fn block_phrases_are_case_insensitive() {
        let classifier = LineClassifier::with_defaults().unwrap();
        assert!(classifier.is_block_line("Oct 4: EXACTLY DENIED tracker.example"));
        assert!(classifier.is_block_line("Oct 4: Exactly Blocked ads.example"));
        assert!(!classifier.is_block_line("Oct 4: forwarded ads.example to 1.1.1.1"));
    }

    #[test]
    fn latest_query_wins() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        classifier.classify(QUERY_LINE, &mut state);
        classifier.classify("Oct  4 14:18:48: query[AAAA] foo.example from 10.0.0.5", &mut state);
        let event = classifier.classify(BLOCK_LINE, &mut state).unwrap();

        assert_eq!(event.address(), Some("10.0.0.5"));
    }

    #[test]
    fn from_must_be_anchored_at_line_end() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        let line = "Oct  4 14:18:46: query[A] example.com from 192.168.1.100 (cached)";
        assert!(classifier.classify(line, &mut state).is_none());
        assert!(state.last_query_address.is_none());
    }

    #[test]
    fn address_mid_description_is_not_the_address() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        let line = "Oct  4: query[PTR] 5.0.0.10.in-addr.arpa from 10.0.0.1 from 10.0.0.9";
        let event = classifier.classify(line, &mut state).unwrap();

        assert_eq!(event.address(), Some("10.0.0.9"));
        assert_eq!(
            event.description(),
            "Oct  4: query[PTR] 5.0.0.10.in-addr.arpa from 10.0.0.1"
        );
    }

    #[test]
    fn malformed_trailing_token_does_not_match() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        for line in [
            "Oct  4: query[A] example.com from 192.168.1",
            "Oct  4: query[A] example.com from 192.168.1.300",
            "Oct  4: query[A] example.com from laptop.lan",
            "Oct  4: query[A] example.com from 1..2.3",
        ] {
            assert!(
                classifier.classify(line, &mut state).is_none(),
                "should not match: {line}"
            );
        }
        assert!(state.last_query_address.is_none());
    }

    #[test]
    fn ipv6_address_is_accepted() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();

        let event = classifier
            .classify("Oct  4: query[AAAA] example.com from fe80::1c2b:3aff:fe4d:5e6f", &mut state)
            .unwrap();
        assert_eq!(event.address(), Some("fe80::1c2b:3aff:fe4d:5e6f"));
    }

    #[test]
    fn query_without_type_marker_does_not_match() {
        let classifier = LineClassifier::with_defaults().unwrap();
        let mut state = SourceState::new();
        assert!(
            classifier
                .classify("Oct  4: reply example.com from 10.0.0.1", &mut state)
                .is_none()
        );
    }

    #[test]
    fn custom_phrases_replace_defaults() {
        let classifier = LineClassifier::new(["Regex Blacklisted"]).unwrap();
        assert!(classifier.is_block_line("Oct 4: regex blacklisted ads.example is 0.0.0.0"));
        assert!(!classifier.is_block_line("Oct 4: gravity blocked ads.example is 0.0.0.0"));
    }

    #[test]
    fn empty_phrase_list_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(LineClassifier::new(empty).is_err());
        assert!(LineClassifier::new(["", "   "]).is_err());
    }

    fn ipv4() -> impl Strategy<Value = String> {
        (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
    }

    proptest! {
        #[test]
        fn any_query_line_yields_its_address(
            qtype in "(A|AAAA|PTR|SRV|HTTPS|TXT)",
            domain in "[a-z]{1,12}(\\.[a-z]{2,6}){1,3}",
            addr in ipv4(),
        ) {
            let classifier = LineClassifier::with_defaults().unwrap();
            let mut state = SourceState::new();
            let line = format!("Oct  4 14:18:46: query[{qtype}] {domain} from {addr}");

            let event = classifier.classify(&line, &mut state);

            prop_assert_eq!(event.as_ref().and_then(|e| e.address()), Some(addr.as_str()));
            prop_assert_eq!(state.last_query_address.as_deref(), Some(addr.as_str()));
        }

        #[test]
        fn block_always_uses_last_query_address(
            addr in ipv4(),
            noise in proptest::collection::vec("[a-z ]{0,30}", 0..8),
        ) {
            let classifier = LineClassifier::with_defaults().unwrap();
            let mut state = SourceState::new();
            classifier.classify(&format!("query[A] example.com from {addr}"), &mut state);
            for line in &noise {
                classifier.classify(line, &mut state);
            }

            let event = classifier.classify("gravity blocked ads.example.com is 0.0.0.0", &mut state);
            prop_assert_eq!(event.as_ref().and_then(|e| e.address()), Some(addr.as_str()));
        }
    }
}
