//! Reply generation.
//!
//! The server core only depends on the [`Responder`] trait; any pure
//! `Fn(&str) -> String` can be plugged in. [`KeywordResponder`] is the
//! stock keyword table the daemon binary ships with.

/// Maps one non-empty input line to one reply line.
///
/// Implementations must be stateless with respect to the caller: the same
/// responder is shared by every session concurrently.
pub trait Responder: Send + Sync {
    fn reply(&self, input: &str) -> String;
}

impl<F> Responder for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn reply(&self, input: &str) -> String {
        self(input)
    }
}

/// Inputs longer than this get a "too long" notice instead of a lookup.
const LONG_INPUT_CHARS: usize = 100;

const HELP_TEXT: &str = "Available phrases: hello/hi, how are you, what is your name, \
help, test, thanks, ping, marco, knock knock, goodbye (leave the chat)";

/// Keyword-table responder.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordResponder;

impl Responder for KeywordResponder {
    fn reply(&self, input: &str) -> String {
        let normalized = input.trim().to_lowercase();

        let canned = match normalized.as_str() {
            "hello" | "hi" | "hey" => Some("Hello there! Nice to meet you."),
            "how are you" | "how are you?" => Some("I'm doing well! How about you?"),
            "what is your name" | "what is your name?" | "who are you" | "who are you?" => {
                Some("I am the ChatBot Server, here to help.")
            }
            "goodbye" | "bye" | "see you" => Some("See you! Thanks for chatting."),
            "help" => Some(HELP_TEXT),
            "time" | "what time is it" | "what time is it?" => {
                Some("Sorry, I can't tell the time yet.")
            }
            "thanks" | "thank you" => Some("You're welcome! Glad to help."),
            "test" | "testing" => Some("Test passed! Your connection works."),
            "ping" => Some("pong!"),
            "knock knock" => Some("Who's there?"),
            "marco" => Some("polo!"),
            _ => None,
        };
        if let Some(reply) = canned {
            return reply.to_string();
        }

        if normalized.contains("name") {
            "My name is ChatBot Server. What's yours?".to_string()
        } else if normalized.split_whitespace().any(|w| w == "age")
            || normalized.contains("old are you")
        {
            "I'm a computer program, so I don't have an age.".to_string()
        } else if normalized.starts_with("how") {
            "Could you be more specific about what you'd like to know?".to_string()
        } else if normalized.starts_with("where") {
            "I live on this server, serving clients like you!".to_string()
        } else if normalized.starts_with("when") {
            "Sorry, I don't have specific time information.".to_string()
        } else if normalized.chars().count() > LONG_INPUT_CHARS {
            "Your message is too long. Try a shorter sentence.".to_string()
        } else {
            format!("Sorry, I don't understand '{input}'. Type 'help' to see what I know.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_is_case_insensitive() {
        let r = KeywordResponder;
        assert_eq!(r.reply("PING"), "pong!");
        assert_eq!(r.reply("  Marco "), "polo!");
    }

    #[test]
    fn test_farewell_words_reply() {
        let r = KeywordResponder;
        assert!(r.reply("goodbye").starts_with("See you"));
        assert!(r.reply("Bye").starts_with("See you"));
    }

    #[test]
    fn test_fallback_echoes_input() {
        let r = KeywordResponder;
        let reply = r.reply("xyzzy");
        assert!(reply.contains("'xyzzy'"));
    }

    #[test]
    fn test_long_input_notice() {
        let r = KeywordResponder;
        let long = "z".repeat(LONG_INPUT_CHARS + 1);
        assert!(r.reply(&long).contains("too long"));
    }

    #[test]
    fn test_closure_is_responder() {
        let upper = |input: &str| input.to_uppercase();
        assert_eq!(upper.reply("abc"), "ABC");
    }
}
