//! ACL subcommands.

use clap::Subcommand;

use genocat_catalog::acl::UpdateAclParams;
use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::types::member::Member;
use genocat_core::types::record::EntityKind;
use genocat_entity::permission::{
    CohortPermission, DatasetPermission, FilePermission, IndividualPermission, JobPermission,
    PanelPermission, SamplePermission, StudyPermission,
};

use crate::output::print_json;

use super::CliContext;

/// Dispatch a generic ACL operation over the entity kind's permission
/// enum. Projects carry no ACLs.
macro_rules! with_permission_kind {
    ($kind:expr, $p:ident => $body:expr) => {
        match $kind {
            EntityKind::Study => {
                type $p = StudyPermission;
                $body
            }
            EntityKind::File => {
                type $p = FilePermission;
                $body
            }
            EntityKind::Sample => {
                type $p = SamplePermission;
                $body
            }
            EntityKind::Individual => {
                type $p = IndividualPermission;
                $body
            }
            EntityKind::Cohort => {
                type $p = CohortPermission;
                $body
            }
            EntityKind::Dataset => {
                type $p = DatasetPermission;
                $body
            }
            EntityKind::Panel => {
                type $p = PanelPermission;
                $body
            }
            EntityKind::Job => {
                type $p = JobPermission;
                $body
            }
            EntityKind::Project => {
                return Err(CatalogError::invalid_argument(
                    "Projects do not carry ACLs; grant permissions on their studies",
                ))
            }
        }
    };
}

/// ACL operations, uniform across entity kinds.
#[derive(Debug, Subcommand)]
pub enum AclCommand {
    /// Create ACL entries for one or more members.
    Create {
        /// Entity kind (study, file, sample, individual, cohort, dataset,
        /// panel, job).
        #[arg(long)]
        kind: String,
        /// Numeric entity id.
        #[arg(long)]
        id: i64,
        /// Comma-separated members (`user`, `@group`, `*`, `anonymous`).
        #[arg(long)]
        members: String,
        /// Comma-separated permission names.
        #[arg(long, default_value = "")]
        permissions: String,
        /// Study ACL template: admin or analyst.
        #[arg(long)]
        template: Option<String>,
    },
    /// Show every ACL entry of an entity.
    GetAll {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        id: i64,
    },
    /// Show one member's ACL entry.
    Get {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        member: String,
    },
    /// Amend one member's permission set.
    Update {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        member: String,
        /// Replace the permission set (excludes --add/--remove).
        #[arg(long)]
        set: Option<String>,
        /// Add permissions.
        #[arg(long)]
        add: Option<String>,
        /// Remove permissions.
        #[arg(long)]
        remove: Option<String>,
    },
    /// Remove one member's ACL entry.
    Remove {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        member: String,
    },
    /// Remove one member's ACL entry without requiring it to exist.
    Reset {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        member: String,
    },
}

fn split_list(list: &str) -> Vec<String> {
    genocat_catalog::resolver::split_reference_list(list)
}

fn parse_members(members: &str) -> CatalogResult<Vec<Member>> {
    split_list(members)
        .iter()
        .map(|m| m.parse())
        .collect()
}

impl AclCommand {
    /// Run the command.
    pub async fn run(self, context: &CliContext) -> CatalogResult<()> {
        let user = context.user.as_str();
        match self {
            Self::Create {
                kind,
                id,
                members,
                permissions,
                template,
            } => {
                let kind: EntityKind = kind.parse()?;
                let members = parse_members(&members)?;
                let permissions = split_list(&permissions);
                let result = if kind == EntityKind::Study {
                    context
                        .mutator
                        .create_study_acls(
                            user,
                            genocat_core::types::id::StudyId::new(id),
                            &members,
                            &permissions,
                            template.as_deref(),
                        )
                        .await?
                } else {
                    with_permission_kind!(kind, P => {
                        context
                            .mutator
                            .create_entity_acls::<P>(user, id, &members, &permissions)
                            .await?
                    })
                };
                print_json(&result)
            }
            Self::GetAll { kind, id } => {
                let kind: EntityKind = kind.parse()?;
                let result = with_permission_kind!(kind, P => {
                    context.mutator.get_all_acls::<P>(user, id).await?
                });
                print_json(&result)
            }
            Self::Get { kind, id, member } => {
                let kind: EntityKind = kind.parse()?;
                let member: Member = member.parse()?;
                let result = with_permission_kind!(kind, P => {
                    context.mutator.get_acl::<P>(user, id, &member).await?
                });
                print_json(&result)
            }
            Self::Update {
                kind,
                id,
                member,
                set,
                add,
                remove,
            } => {
                let kind: EntityKind = kind.parse()?;
                let member: Member = member.parse()?;
                let params = UpdateAclParams {
                    set: set.as_deref().map(split_list),
                    add: add.as_deref().map(split_list),
                    remove: remove.as_deref().map(split_list),
                };
                let result = with_permission_kind!(kind, P => {
                    context
                        .mutator
                        .update_acl::<P>(user, id, &member, params)
                        .await?
                });
                print_json(&result)
            }
            Self::Remove { kind, id, member } => {
                let kind: EntityKind = kind.parse()?;
                let member: Member = member.parse()?;
                let result = with_permission_kind!(kind, P => {
                    context.mutator.remove_acl::<P>(user, id, &member).await?
                });
                print_json(&result)
            }
            Self::Reset { kind, id, member } => {
                let kind: EntityKind = kind.parse()?;
                let member: Member = member.parse()?;
                let result = with_permission_kind!(kind, P => {
                    context.mutator.reset_acl::<P>(user, id, &member).await?
                });
                print_json(&result)
            }
        }
    }
}
