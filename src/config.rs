use std::env;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the value of the named environment variable, treating blank values as unset.
pub fn get_optional_variable(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

const SPREADSHEET_PATH: &str = "/spreadsheets/d/";

/// Pulls the spreadsheet ID out of a spreadsheet URL. Anything that does not
/// look like one is taken to be an ID already and returned trimmed.
pub fn extract_spreadsheet_id(input: &str) -> String {
    let input = input.trim();

    let start = match input.find(SPREADSHEET_PATH) {
        Some(index) => index + SPREADSHEET_PATH.len(),
        None => return input.to_owned(),
    };

    let id = input[start..]
        .chars()
        .take_while(|c| is_id_character(*c))
        .collect::<String>();

    if id.is_empty() {
        input.to_owned()
    } else {
        id
    }
}

/// Whether `id` could be a spreadsheet ID: non-empty and made only of
/// letters, digits, `-` and `_`.
pub fn is_valid_spreadsheet_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(is_id_character)
}

fn is_id_character(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
