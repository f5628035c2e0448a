/// Placeholder tokens and the contact field each one stands for.
const TOKENS: &[(&str, Field)] = &[
    ("{given_name}", Field::Given),
    ("{family_name}", Field::Family),
    // historical spellings used by older contact sheets
    ("{first_name}", Field::Given),
    ("{last_name}", Field::Family),
];

#[derive(Clone, Copy)]
enum Field {
    Given,
    Family,
}

/// Substitute the name placeholders of `template`.
///
/// Substitution is a single left-to-right pass: a substituted value is copied
/// as data and never expanded again. Unknown `{...}` tokens are left verbatim.
pub fn render(template: &str, given_name: &str, family_name: &str) -> String {
    let mut out = String::with_capacity(template.len() + given_name.len() + family_name.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        rest = &rest[open..];

        match TOKENS.iter().find(|(token, _)| rest.starts_with(token)) {
            Some((token, field)) => {
                out.push_str(match field {
                    Field::Given => given_name,
                    Field::Family => family_name,
                });
                rest = &rest[token.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
