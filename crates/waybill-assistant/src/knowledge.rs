//! Knowledge catalog: role → context → canonical entry.
//!
//! The catalog is read-only once built. Every role carries a `"default"`
//! entry, so a lookup for any (role, context) pair always resolves.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use waybill_core::{Context, KnowledgeEntry, QuickOption, Role};

use crate::error::AssistantError;

// =============================================================================
// RoleBranch
// =============================================================================

/// All entries visible to one role, in authoring order.
///
/// Unknown contexts resolve through the `"default"` slot of `entries`, so a
/// lookup for an unmapped context always equals the default lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleBranch {
    entries: IndexMap<Context, KnowledgeEntry>,
    default_index: usize,
}

impl RoleBranch {
    /// Build a validated branch whose default entry is enumerated first.
    ///
    /// Fails if `others` repeats the `"default"` context or any message is
    /// blank.
    pub fn new(
        role: Role,
        default: KnowledgeEntry,
        others: Vec<(Context, KnowledgeEntry)>,
    ) -> Result<Self, AssistantError> {
        let mut entries = IndexMap::with_capacity(others.len() + 1);
        entries.insert(Context::default(), default);
        for (context, entry) in others {
            if context.is_default() {
                return Err(AssistantError::DuplicateDefaultContext(role));
            }
            entries.insert(context, entry);
        }
        Self::from_entries(role, entries)
    }

    /// Build a branch from entries in their source order.
    ///
    /// Fails if the `"default"` context is absent or any message is blank.
    pub fn from_entries(
        role: Role,
        entries: IndexMap<Context, KnowledgeEntry>,
    ) -> Result<Self, AssistantError> {
        if let Some((context, _)) = entries
            .iter()
            .find(|(_, entry)| entry.message.trim().is_empty())
        {
            return Err(AssistantError::BlankEntryMessage {
                role,
                context: context.to_string(),
            });
        }
        let default_index = entries
            .get_index_of(Context::DEFAULT)
            .ok_or(AssistantError::MissingDefaultContext(role))?;
        Ok(Self {
            entries,
            default_index,
        })
    }

    /// Hand-authored branch, checked by the built-in catalog tests.
    fn authored(default: KnowledgeEntry, others: Vec<(Context, KnowledgeEntry)>) -> Self {
        let mut entries = IndexMap::with_capacity(others.len() + 1);
        entries.insert(Context::default(), default);
        entries.extend(others);
        Self {
            entries,
            default_index: 0,
        }
    }

    /// Entry for `context`, or the default entry when it is unmapped.
    pub fn entry(&self, context: &str) -> &KnowledgeEntry {
        self.entries
            .get(context)
            .unwrap_or(&self.entries[self.default_index])
    }

    pub fn contains(&self, context: &str) -> bool {
        self.entries.contains_key(context)
    }

    pub fn contexts(&self) -> impl Iterator<Item = (&Context, &KnowledgeEntry)> {
        self.entries.iter()
    }

    /// Every quick option of every context, in enumeration order.
    pub fn options(&self) -> impl Iterator<Item = &QuickOption> {
        self.entries.values().flat_map(|entry| entry.options.iter())
    }
}

// =============================================================================
// KnowledgeBase
// =============================================================================

/// The complete response catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    visitor: RoleBranch,
    client: RoleBranch,
    employee: RoleBranch,
    admin: RoleBranch,
}

/// On-disk shape of a custom catalog: `[role.context]` tables.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct CatalogFile(IndexMap<String, IndexMap<Context, KnowledgeEntry>>);

impl KnowledgeBase {
    pub fn new(
        visitor: RoleBranch,
        client: RoleBranch,
        employee: RoleBranch,
        admin: RoleBranch,
    ) -> Self {
        Self {
            visitor,
            client,
            employee,
            admin,
        }
    }

    pub fn branch(&self, role: Role) -> &RoleBranch {
        match role {
            Role::Visitor => &self.visitor,
            Role::Client => &self.client,
            Role::Employee => &self.employee,
            Role::Admin => &self.admin,
        }
    }

    /// Entry for (role, context), degrading to the role's default entry.
    pub fn entry(&self, role: Role, context: &str) -> &KnowledgeEntry {
        self.branch(role).entry(context)
    }

    /// Load a custom catalog, choosing the format by file extension.
    ///
    /// `.json` is parsed as JSON; anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, AssistantError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AssistantError::KnowledgeLoad(format!("{}: {}", path.display(), e)))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let kb = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        tracing::info!(path = %path.display(), "Knowledge catalog loaded");
        Ok(kb)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AssistantError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| AssistantError::KnowledgeLoad(e.to_string()))?;
        Self::from_catalog(file)
    }

    pub fn from_json_str(content: &str) -> Result<Self, AssistantError> {
        let file: CatalogFile = serde_json::from_str(content)
            .map_err(|e| AssistantError::KnowledgeLoad(e.to_string()))?;
        Self::from_catalog(file)
    }

    fn from_catalog(file: CatalogFile) -> Result<Self, AssistantError> {
        let mut roles: IndexMap<Role, IndexMap<Context, KnowledgeEntry>> = IndexMap::new();
        for (name, entries) in file.0 {
            let role: Role = name.parse()?;
            roles.insert(role, entries);
        }

        let mut take = |role: Role| -> Result<RoleBranch, AssistantError> {
            let entries = roles
                .shift_remove(&role)
                .ok_or(AssistantError::MissingRole(role))?;
            RoleBranch::from_entries(role, entries)
        };

        Ok(Self {
            visitor: take(Role::Visitor)?,
            client: take(Role::Client)?,
            employee: take(Role::Employee)?,
            admin: take(Role::Admin)?,
        })
    }

    /// The hand-authored catalog shipped with the widget.
    pub fn builtin() -> Self {
        Self {
            visitor: builtin_visitor(),
            client: builtin_client(),
            employee: builtin_employee(),
            admin: builtin_admin(),
        }
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// Built-in catalog
// =============================================================================

fn entry(message: &str, options: &[(&str, &str)]) -> KnowledgeEntry {
    KnowledgeEntry {
        message: message.to_string(),
        options: options
            .iter()
            .map(|(trigger, answer)| QuickOption::new(*trigger, *answer))
            .collect(),
    }
}

// Visitor option text must not contain the greeting token "oi", or a plain
// "oi" would be captured by the option scan instead of the small-talk branch.
fn builtin_visitor() -> RoleBranch {
    RoleBranch::authored(
        entry(
            "Olá! Sou o assistente virtual. Posso explicar como funciona o nosso serviço de envios internacionais.",
            &[
                (
                    "Como funciona?",
                    "Você recebe um endereço exclusivo no exterior, faz suas compras e nós guardamos tudo na sua caixa até você pedir o envio.",
                ),
                (
                    "Quanto custa?",
                    "O valor do frete depende do peso e do destino. Use a calculadora na página inicial para uma estimativa.",
                ),
                (
                    "Como me cadastrar?",
                    "Clique em Criar conta no topo da página e preencha seus dados. O cadastro é gratuito.",
                ),
            ],
        ),
        vec![(
            Context::from("pricing-view"),
            entry(
                "Nesta página estão as nossas tarifas de frete por faixa de peso.",
                &[
                    (
                        "Calcular frete",
                        "Informe o peso estimado e o CEP de destino na calculadora para ver o preço de cada serviço.",
                    ),
                    (
                        "Formas de pagamento",
                        "Aceitamos cartão de crédito, Pix e boleto bancário.",
                    ),
                ],
            ),
        )],
    )
}

fn builtin_client() -> RoleBranch {
    RoleBranch::authored(
        entry(
            "Olá! Como posso ajudar com seus envios hoje?",
            &[
                (
                    "Rastrear pacote",
                    "Acesse Meus Envios e clique no código de rastreio para acompanhar a entrega.",
                ),
                (
                    "Minha caixa",
                    "Sua caixa reúne os itens recebidos no armazém. Abra a aba Minha Caixa para ver tudo.",
                ),
                (
                    "Falar com atendente",
                    "Nosso atendimento funciona de segunda a sexta, das 9h às 18h, pelo chat ou pelo e-mail suporte.",
                ),
            ],
        ),
        vec![
            (
                Context::from("box-view"),
                entry(
                    "Esta é a sua caixa: aqui ficam acumulados todos os itens que chegaram ao nosso armazém em seu nome.",
                    &[
                        (
                            "Como enviar?",
                            "Selecione os itens da caixa, clique em Solicitar envio e escolha o serviço de frete.",
                        ),
                        (
                            "Itens proibidos",
                            "Não enviamos baterias soltas, líquidos inflamáveis, armas nem alimentos perecíveis.",
                        ),
                        (
                            "Consolidar itens",
                            "Ao solicitar o envio de vários itens juntos, nós os reembalamos em um único volume para reduzir o frete.",
                        ),
                    ],
                ),
            ),
            (
                Context::from("shipments-view"),
                entry(
                    "Aqui você acompanha todos os seus envios em andamento.",
                    &[
                        (
                            "Rastrear envio",
                            "Clique no envio e em seguida em Rastrear para ver cada etapa, do armazém até a sua porta.",
                        ),
                        (
                            "Prazo de entrega",
                            "O prazo médio é de 7 a 15 dias úteis após a postagem, conforme o serviço escolhido.",
                        ),
                    ],
                ),
            ),
            (
                Context::from("payments-view"),
                entry(
                    "Nesta área ficam suas faturas e pagamentos.",
                    &[
                        (
                            "Pagar fatura",
                            "Abra a fatura pendente e escolha Pix, cartão ou boleto. O envio é liberado após a confirmação.",
                        ),
                        (
                            "Pedir reembolso",
                            "Reembolsos são solicitados pelo atendimento e creditados em até 10 dias úteis.",
                        ),
                    ],
                ),
            ),
        ],
    )
}

fn builtin_employee() -> RoleBranch {
    RoleBranch::authored(
        entry(
            "Olá! Este é o painel do colaborador. O que você precisa fazer agora?",
            &[
                (
                    "Registrar recebimento",
                    "Em Recebimentos, escaneie a etiqueta do pacote e confirme o peso antes de guardar.",
                ),
                (
                    "Consultar caixa de cliente",
                    "Busque o cliente pelo número da suíte em Clientes > Caixas.",
                ),
            ],
        ),
        vec![
            (
                Context::from("box-view"),
                entry(
                    "Caixas de clientes aguardando consolidação ou envio.",
                    &[
                        (
                            "Consolidar volumes",
                            "Abra a solicitação, confira os itens e registre o novo peso e as dimensões do volume único.",
                        ),
                        (
                            "Registrar avaria",
                            "Fotografe o item, marque Avaria na ficha do pacote e o cliente será avisado automaticamente.",
                        ),
                    ],
                ),
            ),
            (
                Context::from("shipments-view"),
                entry(
                    "Fila de envios pendentes de preparação.",
                    &[
                        (
                            "Preparar envio",
                            "Separe os volumes da fila, confira a declaração de conteúdo e marque como Pronto para coleta.",
                        ),
                        (
                            "Imprimir etiqueta",
                            "Selecione o envio e clique em Imprimir etiqueta. Use a impressora térmica da expedição.",
                        ),
                    ],
                ),
            ),
        ],
    )
}

fn builtin_admin() -> RoleBranch {
    RoleBranch::authored(
        entry(
            "Olá, administrador! Posso ajudar com usuários, tarifas e relatórios.",
            &[
                (
                    "Gerenciar usuários",
                    "Em Administração > Usuários você cria, edita e desativa contas de clientes e colaboradores.",
                ),
                (
                    "Configurar tarifas",
                    "Em Administração > Tarifas você ajusta os preços por faixa de peso e por serviço.",
                ),
            ],
        ),
        vec![
            (
                Context::from("finance-view"),
                entry(
                    "Área financeira: receitas, custos e margens da operação.",
                    &[
                        (
                            "Relatório de lucro",
                            "Acesse Financeiro > Relatórios e selecione o período para ver receita, custos e lucro.",
                        ),
                        (
                            "Exportar faturas",
                            "Em Financeiro > Faturas, filtre o período e clique em Exportar CSV.",
                        ),
                    ],
                ),
            ),
            (
                Context::from("shipments-view"),
                entry(
                    "Visão geral de todos os envios da plataforma.",
                    &[
                        (
                            "Envios atrasados",
                            "Use o filtro Status > Atrasado para listar envios fora do prazo e acionar a transportadora.",
                        ),
                        (
                            "Trocar transportadora",
                            "Abra o envio, clique em Editar e escolha outra transportadora antes da coleta.",
                        ),
                    ],
                ),
            ),
        ],
    )
}

// =============================================================================
// Tests
// =============================================================================
