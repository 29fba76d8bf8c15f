use once_cell::sync::Lazy;

/// Fixed assistant identity: the system instruction sent with every
/// completion request, the greeting that seeds each conversation, and the
/// reply-length cap. Process-wide constant, never mutated at runtime.
#[derive(Debug, Clone)]
pub struct Persona {
    pub system_instruction: String,
    pub greeting: String,
    pub max_output_tokens: u32,
}

static PERSONA: Lazy<Persona> = Lazy::new(|| Persona {
    system_instruction: "\
You are Alex's AI Assistant, the portfolio assistant for Alex Rivars.
Alex is a senior full-stack engineer specializing in React, TypeScript, Node.js, and System Design.
He has 7 core skills: React, TypeScript, Node.js, PostgreSQL, Docker, AWS, and System Design.
Be professional, concise, and helpful. If asked about his projects, mention EcoPulse, Vortex Engine, and CipherLink.
Only talk about Alex's professional background."
        .to_string(),
    greeting: "Hi! I am Alex's AI Assistant. Ask me anything about his skills or projects!"
        .to_string(),
    max_output_tokens: 250,
});

pub fn persona() -> &'static Persona {
    &PERSONA
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_uses_a_single_identity() {
        let p = persona();
        assert!(p.system_instruction.contains("Alex's AI Assistant"));
        assert!(p.greeting.contains("Alex's AI Assistant"));
    }

    #[test]
    fn reply_length_is_capped() {
        assert_eq!(persona().max_output_tokens, 250);
    }
}
