//! Prompt text for the generation steps

/// Reporting guidance shared by the writer and the reviser
fn writing_guidance(words: u32) -> String {
    format!(
        r#"Using the transcript or minutes of a meeting provided by the user as your primary source, write a compelling news report of about {words} words that captures the essence and impact of the topics discussed.

A news report of a meeting is a concise, objective and informative account of the key discussions, decisions and outcomes of a gathering such as a local government meeting. It focuses on the most newsworthy aspects and explains their relevance and likely effect on the community, rather than summarizing the agenda in order.

Include:
1. Headline: an attention-grabbing headline that conveys the main outcome of the meeting.
2. Lead paragraph: the key news from the meeting, answering who, what, when, where and why.
3. Context and background needed to understand why the issues matter, including earlier events or decisions.
4. Key outcomes and decisions, how they were reached, and who they affect.
5. Quotes from the transcript in quotation marks for color and reaction; at least one for each of the two most significant items.
6. Implications of the outcomes for the community or organization.
7. Follow-up actions such as further meetings, implementation plans or protests.
8. A closing that sums up and notes any open questions.

Rules for quotes:
- Text in quotation marks is used to link the words to the recording, so it must be word for word and letter for letter from the transcript.
- Do not invent, alter, correct or abridge quotes, even when they contain obvious transcription errors.
- Keep numbers in the form the transcript uses: do not change "30" to "thirty" or the reverse.
- Keep colloquialisms: do not change "gonna" to "going to".
- Keep repeated words and phrases exactly as spoken.
- If a quote contains a misspelled proper name, do not correct it and do not use it; find another passage.
- You may follow a quote that seems to contain errors with "(sic)".
- Do not escape quotation marks with backslashes.
- If you need to paraphrase, use an indirect quote ("the mayor said that ...") with no quotation marks, followed by the verbatim transcript text that was paraphrased inside square brackets and double quotation marks.

The report must be engaging, factually accurate and fair."#
    )
}

pub fn writer_system(words: u32) -> String {
    format!(
        r#"{}

Return nothing but JSON in the following format:
{{
  "title": "title of the article",
  "date": "date of the meeting",
  "body": "the body of the article, about {} words, in markdown paragraphs separated by newlines",
  "information_suggested": "information not in the source that would make the story more complete",
  "summary": "two sentence summary of the article"
}}"#,
        writing_guidance(words),
        words
    )
}

pub fn writer_user(source: &str, items: &str) -> String {
    format!(
        r#"Here is the source document describing the meeting:
{source}

Below is a list, in descending order of significance, of the issues covered in the meeting. The first item is the lede and gets about a third of the story. The second gets about half as much space, the third less again, and the rest get a brief mention.
{items}"#
    )
}

pub fn reviser_system(words: u32) -> String {
    format!(
        r#"You are a newspaper editor. Rewrite the article the user supplies so that it addresses the critique the user also supplies, while following these instructions:

{}

Return nothing but JSON in the following format:
{{
  "body": "the rewritten body of the article",
  "message": "anything in the critique you were not able to do, or an empty string"
}}"#,
        writing_guidance(words)
    )
}

pub fn reviser_user(body: &str, critique: &str, source: &str) -> String {
    format!(
        r#"Rewrite the article below:
{body}

as asked in this critique:
{critique}

Quotes must still come verbatim from the source document:
{source}"#
    )
}

const OUTLINE_FORMAT: &str = r#"Return nothing but JSON in the following format:
{
  "significant_items": [
    {"number": 1, "description": "brief description of the item", "explanation": "brief explanation of why it matters"}
  ]
}"#;

pub fn outliner_system() -> String {
    format!(
        r#"You are an editor in a newsroom. Using the transcript or minutes of a meeting provided by the user as your only source, list the ten most significant actions or topics of the meeting, most significant first.

Significance depends on the controversy around an item, how much it was discussed, and its likely effect. Leave out routine business such as the opening of the meeting unless something about it is genuinely significant.

{OUTLINE_FORMAT}"#
    )
}

pub fn outline_reviser_system(items: &str) -> String {
    format!(
        r#"You are an editor in a newsroom. You previously produced this list of significant items from the meeting source provided by the user:
{items}

The user has asked for changes to the list. Make them, keeping the list in descending order of significance.

{OUTLINE_FORMAT}"#
    )
}

pub fn outliner_user(source: &str, critique: Option<&str>) -> String {
    match critique {
        Some(critique) => format!(
            "This is the source information for the meeting:\n{source}\n\nThis is how I would like the list revised:\n{critique}"
        ),
        None => format!("This is the source information for the meeting:\n{source}"),
    }
}

/// Reply the critic gives when it has nothing to add
pub const NO_CRITIQUE: &str = "None";

pub fn critic_system() -> String {
    format!(
        r#"You critique newspaper writing. Give short feedback on the article the user provides.
The article is a news story, so it should not contain editorial comment.
Names must be given for split votes and for people who spoke in debate.
The maker of each motion should be named.
Try to find at least one thing to improve. If the article is as good as it can be, reply with only the word {NO_CRITIQUE}."#
    )
}

pub fn critic_user(today: &str, title: &str, body: &str, source: &str) -> String {
    format!(
        r#"Today's date is {today}.

Title: {title}

Article:
{body}

Source the article is based on:
{source}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_is_interpolated() {
        assert!(writer_system(1500).contains("about 1500 words"));
        assert!(reviser_system(800).contains("about 800 words"));
    }

    #[test]
    fn test_outliner_user_includes_critique() {
        let prompt = outliner_user("minutes", Some("merge items 2 and 3"));
        assert!(prompt.contains("merge items 2 and 3"));
        assert!(!outliner_user("minutes", None).contains("revised"));
    }
}
