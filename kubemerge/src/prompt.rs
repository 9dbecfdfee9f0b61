use anyhow::Context as _;
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Select};

pub trait Prompt {
    /// Index of the chosen item.
    fn select(&mut self, message: &str, items: &[String]) -> anyhow::Result<usize>;

    /// Free text. Empty input yields `default` when one is given.
    fn input(&mut self, message: &str, default: Option<&str>) -> anyhow::Result<String>;

    /// Side note shown before a question.
    fn hint(&mut self, text: &str);
}

impl<P: Prompt + ?Sized> Prompt for &mut P {
    fn select(&mut self, message: &str, items: &[String]) -> anyhow::Result<usize> {
        (**self).select(message, items)
    }

    fn input(&mut self, message: &str, default: Option<&str>) -> anyhow::Result<String> {
        (**self).input(message, default)
    }

    fn hint(&mut self, text: &str) {
        (**self).hint(text)
    }
}

/// Interactive prompts on the controlling terminal.
pub struct Terminal {
    theme: ColorfulTheme,
}

impl Default for Terminal {
    fn default() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompt for Terminal {
    fn select(&mut self, message: &str, items: &[String]) -> anyhow::Result<usize> {
        Select::with_theme(&self.theme)
            .with_prompt(message)
            .items(items)
            .default(0)
            .interact()
            .context("Reading selection")
    }

    fn input(&mut self, message: &str, default: Option<&str>) -> anyhow::Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme);
        input.with_prompt(message).allow_empty(true);
        if let Some(default) = default.filter(|d| !d.is_empty()) {
            input.default(default.to_owned());
        }

        let answer = input.interact_text().context("Reading input")?;
        Ok(answer.trim().to_owned())
    }

    fn hint(&mut self, text: &str) {
        println!("{}", style(text).dim());
    }
}
