//! Form validation performed before anything reaches the network.
//!
//! Failures are collected per field so a front end can show them inline.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{PetRequest, TutorRequest};

static LETTERS_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\u{C0}-\u{FF}\s]+$").expect("static regex"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

const MAX_NAME_CHARS: usize = 200;
const MAX_ADDRESS_CHARS: usize = 500;
const MAX_BREED_CHARS: usize = 100;
const MAX_AGE: u32 = 100;
const CPF_DIGITS: usize = 11;

/// A single field failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All failures found in one form, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "invalid form ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    /// The first message recorded for `field`.
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

/// Kind of phone line; decides how many digits the number must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// Landline, 8 digits.
    Landline,
    /// Mobile, 9 digits.
    Mobile,
}

impl ContactKind {
    fn digits(self) -> usize {
        match self {
            ContactKind::Landline => 8,
            ContactKind::Mobile => 9,
        }
    }
}

impl std::str::FromStr for ContactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telefone" | "landline" => Ok(ContactKind::Landline),
            "celular" | "mobile" => Ok(ContactKind::Mobile),
            other => Err(format!("unknown contact kind: {other}")),
        }
    }
}

/// Raw tutor form input.
#[derive(Debug, Clone, Default)]
pub struct TutorForm {
    pub name: String,
    pub cpf: String,
    pub email: String,
    pub contact_kind: Option<ContactKind>,
    pub contact_number: String,
    pub address: String,
}

impl TutorForm {
    /// Validate and convert into the API payload.
    pub fn validate(&self) -> Result<TutorRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = normalize_name(&self.name);
        if name.is_empty() {
            errors.push("nome", "Nome é obrigatório");
        } else if name.chars().count() > MAX_NAME_CHARS {
            errors.push("nome", "Nome deve ter no máximo 200 caracteres");
        } else if !LETTERS_ONLY.is_match(&name) {
            errors.push("nome", "Nome deve conter apenas letras");
        }

        let cpf_digits = digits(&self.cpf);
        if self.cpf.trim().is_empty() {
            errors.push("cpf", "CPF é obrigatório");
        } else if cpf_digits.len() != CPF_DIGITS {
            errors.push("cpf", "CPF deve ter 11 dígitos");
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.push("email", "E-mail é obrigatório");
        } else if !EMAIL.is_match(email) {
            errors.push("email", "E-mail inválido");
        }

        if self.contact_kind.is_none() {
            errors.push("tipoContato", "Selecione o tipo de contato");
        }

        let number = digits(&self.contact_number);
        if self.contact_number.trim().is_empty() {
            errors.push("numeroContato", "Número de contato é obrigatório");
        } else if let Some(kind) = self.contact_kind {
            if number.len() != kind.digits() {
                errors.push(
                    "numeroContato",
                    "Número inválido para o tipo de contato selecionado",
                );
            }
        }

        let address = self.address.trim();
        if address.is_empty() {
            errors.push("endereco", "Endereço é obrigatório");
        } else if address.chars().count() > MAX_ADDRESS_CHARS {
            errors.push("endereco", "Endereço deve ter no máximo 500 caracteres");
        }

        errors.into_result(|| TutorRequest {
            name,
            email: email.to_string(),
            phone: number,
            address: address.to_string(),
            cpf: cpf_digits.parse().ok(),
        })
    }
}

/// Raw pet form input.
#[derive(Debug, Clone, Default)]
pub struct PetForm {
    pub name: String,
    pub breed: String,
    pub age: Option<u32>,
}

impl PetForm {
    pub fn validate(&self) -> Result<PetRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = normalize_name(&self.name);
        if name.is_empty() {
            errors.push("nome", "Nome é obrigatório");
        } else if name.chars().count() > MAX_NAME_CHARS {
            errors.push("nome", "Nome deve ter no máximo 200 caracteres");
        }

        let breed = self.breed.trim();
        if breed.chars().count() > MAX_BREED_CHARS {
            errors.push("raca", "Raça deve ter no máximo 100 caracteres");
        }

        if self.age.is_some_and(|age| age > MAX_AGE) {
            errors.push("idade", "Idade inválida");
        }

        errors.into_result(|| PetRequest {
            name,
            breed: (!breed.is_empty()).then(|| breed.to_string()),
            age: self.age,
        })
    }
}

/// Trim and collapse inner whitespace runs to a single space.
pub fn normalize_name(raw: &str) -> String {
    WHITESPACE_RUN.replace_all(raw.trim(), " ").into_owned()
}

fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
