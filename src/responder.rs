use regex::Regex;

pub const ACKNOWLEDGEMENT: &str = "Yes I'm running";
pub const FALLBACK_REPLY: &str = "I did not understand you!";

/// Checked in order; the first match wins.
pub const TRIGGERS: [&str; 4] = ["alive", "up", "running", "hello"];

struct Rule {
    trigger: &'static str,
    pattern: Regex,
}

/// Stateless keyword matcher for messages posted in the debugging channel.
pub struct Responder {
    rules: Vec<Rule>,
}

impl Responder {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = TRIGGERS
            .iter()
            .map(|&trigger| -> Result<Rule, regex::Error> {
                let pattern = Regex::new(&format!(
                    r"(?i)(?:^|\W){}(?:$|\W)",
                    regex::escape(trigger)
                ))?;
                Ok(Rule { trigger, pattern })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    pub fn matched_trigger(&self, text: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.trigger)
    }

    pub fn respond(&self, text: &str) -> &'static str {
        match self.matched_trigger(text) {
            Some(_) => ACKNOWLEDGEMENT,
            None => FALLBACK_REPLY,
        }
    }
}
