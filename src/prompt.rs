//! Consultant persona and prompt construction
//!
//! The completion service never sees earlier turns: every request is the
//! persona instruction followed by the visitor's latest question, sent as a
//! single user content.

/// Instruction prepended to every question
const SYSTEM_INSTRUCTION: &str = "Ты опытный консультант строительной компании \"СтройМастер\". \
Отвечай кратко, профессионально и дружелюбно. Твоя цель - помочь клиенту с первичными вопросами \
по строительству, ремонту и материалам. Не давай точных смет, только приблизительные оценки. \
В конце ответа предлагай связаться с менеджером для детального расчета.";

/// Seed message shown when a widget mounts
const GREETING: &str = "Привет! Я виртуальный помощник СтройМастер. Хотите узнать примерную \
стоимость ремонта или получить совет по материалам?";

/// Shown when the service answers with no text
const EMPTY_REPLY_NOTICE: &str =
    "Извините, я сейчас не могу ответить. Пожалуйста, попробуйте позже.";

/// Shown when the service call fails
const SERVICE_ERROR_NOTICE: &str =
    "Произошла ошибка при соединении с сервером. Пожалуйста, позвоните нам.";

/// Fixed texts shaping one consultant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub system_instruction: String,
    pub greeting: String,
    pub empty_reply_notice: String,
    pub service_error_notice: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            greeting: GREETING.to_string(),
            empty_reply_notice: EMPTY_REPLY_NOTICE.to_string(),
            service_error_notice: SERVICE_ERROR_NOTICE.to_string(),
        }
    }
}

impl Persona {
    /// Build the prompt for one question.
    ///
    /// Format: `System Instruction: <instruction>` and `User Question: <text>`
    /// separated by a blank line.
    pub fn build_prompt(&self, question: &str) -> String {
        format!(
            "System Instruction: {}\n\nUser Question: {}",
            self.system_instruction, question
        )
    }
}
