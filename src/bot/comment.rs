/// A comment that can be posted to a pull request or a commit.
pub struct Comment {
    text: String,
}

impl Comment {
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Summary of a finished review.
pub fn review_summary_comment(summary: &str) -> Comment {
    Comment {
        text: format!("## AI Code Review\n\n{summary}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_review_summary() {
        let comment = review_summary_comment("Looks good overall.");
        insta::assert_snapshot!(comment.text(), @r#"
        ## AI Code Review

        Looks good overall.
        "#);
    }
}
