//! Prompt construction and response parsing for free-form LLM completions.
//!
//! The model is asked for a fixed three-part layout:
//!
//! ```text
//! PRODUTIVO
//! CONFIDENCE: 0.87
//! RESPOSTA_SUGERIDA: Obrigado, vamos revisar.
//! ```
//!
//! Parsing is lenient. Anything the model gets wrong degrades to
//! `Category::Unclassified`, no confidence, or the whole text as the reply.

use std::sync::LazyLock;

use regex::Regex;

use super::category::Category;
use super::inference::Inference;

const REPLY_PREFIX: &str = "RESPOSTA_SUGERIDA:";
const CONFIDENCE_PREFIX: &str = "CONFIDENCE:";

/// Field names that SDK wrappers append when a response object is
/// stringified. Everything from the first one onward is dropped.
const SDK_METADATA_TOKENS: &[&str] = &[
    "sdk_http_response",
    "candidates",
    "usage_metadata",
    "parsed",
    "create_time",
    "model_version",
    "prompt_feedback",
    "response_id",
    "candidates_token_count",
    "prompt_token_count",
    "total_token_count",
    "automatic_function_calling_history",
];

static RE_BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static RE_LEADING_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:CATEGORIA\s*:\s*)?(?:IMPRODUTIVO|PRODUTIVO)\s*(?:CONFIDENCE\s*:\s*(?:[0-9.]+|null))?[\s:\-]*",
    )
    .unwrap()
});
static RE_REPLY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)RESPOSTA_SUGERIDA\s*:\s*").unwrap());

const INSTRUCTIONS: &str = "\
INSTRUÇÕES (OBRIGATÓRIO): Você é um assistente que analisa e classifica e-mails em duas categorias: PRODUTIVO ou IMPRODUTIVO.
- PRODUTIVO: e-mails que requerem ação ou resposta específica.
- IMPRODUTIVO: e-mails que não necessitam de ação imediata (piadas, convites sociais, mensagens sem relação direta ao trabalho).

SAÍDA OBRIGATÓRIA:
1) PRIMEIRA LINHA: apenas a CATEGORIA em maiúsculas: PRODUTIVO ou IMPRODUTIVO.
2) SEGUNDA LINHA: 'CONFIDENCE: <valor>' entre 0 e 1.
3) TERCEIRA LINHA EM DIANTE: 'RESPOSTA_SUGERIDA:' seguido do texto da resposta.

REGRAS PARA RESPOSTA_SUGERIDA:
- É PROIBIDO repetir ou reescrever o conteúdo do e-mail recebido.
- Escreva como se fosse um colega respondendo ao remetente.
- A resposta deve ser curta, clara e acrescentar valor (ex.: agradecer, confirmar recebimento, indicar próxima ação).
- Use tom educado e profissional.
- Preserve formatação: quebras de linha, barras, acentuação e caracteres especiais.
- Utilize os exemplos abaixo para entender o estilo e formatação da resposta desejados.
";

struct Example {
    email: &'static str,
    category: Category,
    reason: &'static str,
    reply: &'static str,
}

const EXAMPLES: &[Example] = &[
    Example {
        email: "Prezada equipe,\n\nFinalizei o relatório mensal e já o subi na pasta \\Relatórios_2025\\.\nA reunião de alinhamento será terça-feira às 10h.\nPor favor, revisem antes.\n\nAtenciosamente,\nCarlos",
        category: Category::Produtivo,
        reason: "O email contém informações de trabalho claras: entrega de relatório e marcação de reunião.",
        reply: "Obrigado, Carlos! Vamos revisar o relatório antes da reunião.\nAté terça-feira.",
    },
    Example {
        email: "Oi pessoal,\n\nVocês viram aquele vídeo engraçado que mandei no grupo? kkkkk\nE aí, sexta vai ter happy hour ou não?\n\nAbraços,\nJoão",
        category: Category::Improdutivo,
        reason: "O email trata apenas de assuntos pessoais e piadas, sem relação com trabalho.",
        reply: "Oi João, vamos focar os emails apenas em questões do trabalho.\nSobre o happy hour, podemos falar no grupo. :)",
    },
    Example {
        email: "Equipe,\n\nPrecisamos enviar o material para o cliente até amanhã às 17h.\nJá organizei os arquivos na pasta compartilhada.\n\n[]s,\nRafael",
        category: Category::Produtivo,
        reason: "O email define prazo e organiza entrega de material para cliente.",
        reply: "Obrigado, Rafael!\nVamos garantir que tudo esteja pronto e validado até amanhã às 17h.",
    },
    Example {
        email: "Fala galera,\n\nVamos pedir pizza hoje no almoço?\nQual sabor vcs querem? 🍕\n\nAbs,\nThiago",
        category: Category::Improdutivo,
        reason: "Email informal sobre almoço, não relacionado ao trabalho.",
        reply: "Oi Thiago, bora combinar isso pessoalmente.\nNo email, vamos focar nas demandas do projeto. :)",
    },
    Example {
        email: "Boa tarde,\n\nAnexei o documento com os indicadores de desempenho (KPI) do último trimestre.\nEle está em PDF, nome: Indicadores_Q3.pdf\n\nAtenciosamente,\nBeatriz",
        category: Category::Produtivo,
        reason: "O email fornece dados de desempenho que fazem parte do acompanhamento do trabalho.",
        reply: "Obrigado, Beatriz!\nDocumento recebido.\nVamos analisar os indicadores e discutir na próxima reunião.",
    },
    Example {
        email: "Oi,\n\nAlguém sabe se sexta é feriado mesmo? Não quero vir à toa kkkkk\n\nValeu,\nAndré",
        category: Category::Improdutivo,
        reason: "Pergunta informal que poderia ser resolvida em calendário oficial.",
        reply: "Oi André, confira no calendário oficial da empresa para confirmar.\nAssim garantimos que todos estejam alinhados.",
    },
];

/// Builds the few-shot classification prompt for `text`.
pub fn build_prompt(text: &str, username: Option<&str>) -> String {
    let examples = EXAMPLES
        .iter()
        .map(|ex| {
            format!(
                "EMAIL: {}\nCATEGORIA: {}\nRAZAO: {}\n{} {}",
                ex.email, ex.category, ex.reason, REPLY_PREFIX, ex.reply
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut parts = vec![
        INSTRUCTIONS.to_string(),
        examples,
        "ANALISE O SEGUINTE EMAIL A PARTIR DAQUI:".to_string(),
    ];
    if let Some(name) = username.filter(|n| !n.trim().is_empty()) {
        parts.push(format!("Usuário: {}", name.trim()));
    }
    parts.push(format!("TEXTO:\n{}", text));
    parts.join("\n\n")
}

/// Parses a completion into an [`Inference`].
pub fn parse_completion(raw: &str) -> Inference {
    let cleaned = strip_sdk_artifacts(raw);
    let lines: Vec<&str> = cleaned.lines().collect();

    let category = Category::normalize(lines.first().map(|l| l.trim()));

    let mut confidence = None;
    let mut reply = String::new();
    if lines.len() >= 2 {
        if let Some(value) = strip_prefix_ignore_case(lines[1].trim(), CONFIDENCE_PREFIX) {
            let value = value.trim();
            if !value.eq_ignore_ascii_case("null") {
                confidence = value.parse::<f64>().ok();
            }
        }
        reply = lines[2..].join("\n").trim().to_string();
    }

    if reply.is_empty() {
        let rest = RE_LEADING_HEADER.replace(&cleaned, "");
        reply = RE_REPLY_MARKER.replace_all(&rest, "").trim().to_string();
    }

    let reply = match strip_prefix_ignore_case(&reply, REPLY_PREFIX) {
        Some(stripped) => stripped.trim().to_string(),
        None => reply,
    };

    Inference::new(category, confidence, reply)
}

/// Cuts SDK metadata that leaked into the completion text.
fn strip_sdk_artifacts(raw: &str) -> String {
    let cut = SDK_METADATA_TOKENS
        .iter()
        .filter_map(|token| raw.find(token))
        .min()
        .unwrap_or(raw.len());
    RE_BLANK_RUNS.replace_all(&raw[..cut], "\n\n").into_owned()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
