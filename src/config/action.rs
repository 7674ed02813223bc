//! Action grammar
//!
//! Parses the textual policy action form:
//!
//! ```text
//! action     := [select_group random] [fallback drop] group_list
//! group_list := group | "group" <id> group ("group" <id> group)*
//! group      := [random] "labels" <u8>("," <u8>)*
//! ```
//!
//! Labels are integers in [0, 254].

use crate::dataplane::{Fallback, LinkGroup, PolicyAction, Selection, MAX_LABEL};
use crate::error::{Error, Result};

/// Parse an action string into a pre-computed [`PolicyAction`].
pub fn parse_action(input: &str) -> Result<PolicyAction> {
    let mut tokens = input.split_whitespace().peekable();
    let mut selection = Selection::Ordered;
    let mut fallback = Fallback::DefaultRoute;
    let mut groups = Vec::new();

    while let Some(&token) = tokens.peek() {
        match token {
            "select_group" => {
                tokens.next();
                expect(&mut tokens, "random")?;
                selection = Selection::Random;
            }
            "fallback" => {
                tokens.next();
                expect(&mut tokens, "drop")?;
                fallback = Fallback::Drop;
            }
            "group" => {
                tokens.next();
                // The group id is cosmetic; groups apply in declared order.
                let id = tokens
                    .next()
                    .ok_or_else(|| Error::Parse("expected group id".into()))?;
                id.parse::<u32>()
                    .map_err(|_| Error::Parse(format!("bad group id '{}'", id)))?;
                groups.push(parse_group(&mut tokens)?);
            }
            "random" | "labels" => {
                // Single unnamed group, which must end the action.
                groups.push(parse_group(&mut tokens)?);
                if let Some(extra) = tokens.next() {
                    return Err(Error::Parse(format!("unexpected input '{}'", extra)));
                }
            }
            other => {
                return Err(Error::Parse(format!("unknown input '{}'", other)));
            }
        }
    }

    if groups.is_empty() {
        return Err(Error::Parse(
            "specify at least one group of links in action".into(),
        ));
    }
    PolicyAction::new(fallback, selection, groups)
}

fn expect(
    tokens: &mut std::iter::Peekable<std::str::SplitWhitespace<'_>>,
    word: &str,
) -> Result<()> {
    match tokens.next() {
        Some(t) if t == word => Ok(()),
        Some(t) => Err(Error::Parse(format!("expected '{}', got '{}'", word, t))),
        None => Err(Error::Parse(format!("expected '{}'", word))),
    }
}

fn parse_group(
    tokens: &mut std::iter::Peekable<std::str::SplitWhitespace<'_>>,
) -> Result<LinkGroup> {
    let mut selection = Selection::Ordered;
    if tokens.peek() == Some(&"random") {
        tokens.next();
        selection = Selection::Random;
    }
    expect(tokens, "labels")?;
    let list = tokens
        .next()
        .ok_or_else(|| Error::Parse("expected label list".into()))?;

    let mut labels = Vec::new();
    for part in list.split(',') {
        let label: u32 = part
            .trim()
            .parse()
            .map_err(|_| Error::Parse(format!("bad label '{}'", part)))?;
        if label > MAX_LABEL as u32 {
            return Err(Error::Parse(format!(
                "illegal label {}, should be in range [0-254]",
                label
            )));
        }
        labels.push(label as u8);
    }
    LinkGroup::new(selection, labels)
}
