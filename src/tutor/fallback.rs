//! Canned answers used whenever the AI service cannot be reached.

const DEFAULT_REPLY: &str = "That's a great question! I can't reach my thinking cap right now, \
so try asking a grown-up or look back at the tutorials. Keep experimenting with your code. \
Every programmer learns by trying things out! 🐍";

// Checked in order; the first entry with a matching keyword wins, so more
// specific topics come before general ones.
const REPLIES: &[(&[&str], &str)] = &[
    (
        &["error", "bug", "traceback", "wrong", "broken"],
        "Errors are clues, not failures! Read the last line of the error message: it tells you \
         what went wrong, like a NameError for a misspelled variable. Check your spelling, your \
         brackets and your indentation. 🕵️",
    ),
    (
        &["print"],
        "print() shows things on the screen. Put words in quotes like print(\"Hello!\") or \
         print a variable like print(score). 📢",
    ),
    (
        &["variable", "store"],
        "A variable is like a labelled box. Write name = \"Sam\" to put \"Sam\" in a box called \
         name, then use name whenever you need it. 📦",
    ),
    (
        &["loop", "repeat", "while", "range"],
        "Loops repeat code for you! for i in range(3): runs the indented lines 3 times. A while \
         loop keeps going as long as its question is True. 🔁",
    ),
    (
        &["if", "else", "decision", "choose"],
        "if lets your program make choices: if score > 10: print(\"You win!\"). Add else: for \
         what happens otherwise. Don't forget the colon and the indent! 🤔",
    ),
    (
        &["function", "def"],
        "A function is a mini-program with a name. Make one with def say_hi(): and run it by \
         writing say_hi(). Functions save you from writing the same code again. 🧩",
    ),
    (
        &["list", "array"],
        "A list keeps lots of things in order: pets = [\"cat\", \"dog\"]. Get the first one with \
         pets[0]. Python starts counting at 0! 📝",
    ),
    (
        &["string", "text", "word"],
        "A string is text inside quotes, like \"hello\". You can join strings with + and make \
         them shout with .upper(). 🔤",
    ),
    (
        &["number", "math", "add", "plus", "multiply"],
        "Python is a super calculator: + adds, - subtracts, * multiplies and / divides. Try \
         print(7 * 6)! 🔢",
    ),
    (
        &["input"],
        "input() asks the person using your program a question and gives back what they type: \
         name = input(\"What's your name? \"). 💬",
    ),
    (
        &["python"],
        "Python is a friendly programming language. People use it to build games, websites and \
         even robots. You're learning the same language real programmers use! 🐍",
    ),
];

/// Picks the canned reply for a question. A keyword matches a whole word or
/// its plural, so "loops" finds "loop" but "address" does not find "add".
pub fn fallback_reply(question: &str) -> &'static str {
    let question = question.to_lowercase();
    let words: Vec<&str> = question
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|word| !word.is_empty())
        .collect();

    REPLIES
        .iter()
        .find(|(keywords, _)| {
            keywords
                .iter()
                .any(|keyword| words.iter().any(|word| matches_keyword(word, keyword)))
        })
        .map(|(_, reply)| *reply)
        .unwrap_or(DEFAULT_REPLY)
}

fn matches_keyword(word: &str, keyword: &str) -> bool {
    word == keyword || word.strip_suffix('s') == Some(keyword)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_REPLY, fallback_reply};

    #[test]
    fn test_matches_keywords_case_insensitively() {
        assert!(fallback_reply("How do I use PRINT?").contains("print()"));
        assert!(fallback_reply("what is a variable").contains("labelled box"));
        assert!(fallback_reply("how do I make a list").contains("pets[0]"));
        assert!(fallback_reply("Why do loops repeat?").contains("range(3)"));
    }

    #[test]
    fn test_errors_take_priority() {
        assert!(fallback_reply("my print gives an error").contains("Errors are clues"));
    }

    #[test]
    fn test_unknown_question_gets_default() {
        assert_eq!(fallback_reply("zzz"), DEFAULT_REPLY);
        assert_eq!(fallback_reply("I forgot my lunch"), DEFAULT_REPLY);
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        assert_eq!(fallback_reply("what is my email address"), DEFAULT_REPLY);
        assert_eq!(fallback_reply("I definitely don't get it"), DEFAULT_REPLY);
        assert!(fallback_reply("how do I add numbers").contains("super calculator"));
        assert!(fallback_reply("what are functions").contains("def say_hi()"));
    }
}
