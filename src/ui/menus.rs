use serenity::all::{ButtonStyle, InputTextStyle};
use serenity::builder::{
    CreateActionRow, CreateButton, CreateInputText, CreateModal, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption,
};

use crate::catalog::QuestDef;
use crate::utils::{clip, ComponentAction};

pub const PROOF_INPUT_ID: &str = "proof";
pub const REASON_INPUT_ID: &str = "reason";
pub const PROOF_MAX_LEN: u16 = 1000;
pub const REASON_MAX_LEN: u16 = 500;

/* Quest picker under the /sz board; None when nothing is submittable */
pub fn quest_select_row<'a>(quests: impl IntoIterator<Item = &'a QuestDef>) -> Option<CreateActionRow> {
    let options: Vec<CreateSelectMenuOption> = quests
        .into_iter()
        .take(25)
        .map(|q| {
            CreateSelectMenuOption::new(clip(&format!("{}: {}", q.code, q.name), 100), q.code.as_str())
                .description(format!("{} - {} XP", q.kind.label(), q.xp))
        })
        .collect();
    if options.is_empty() {
        return None;
    }

    let menu = CreateSelectMenu::new(
        ComponentAction::PickQuest.custom_id(),
        CreateSelectMenuKind::String { options },
    )
        .placeholder("Choose a quest to submit")
        .min_values(1)
        .max_values(1);

    Some(CreateActionRow::SelectMenu(menu))
}

/* Approve / Reject under a review embed */
pub fn review_buttons_row(submission_id: i64) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(ComponentAction::Approve(submission_id).custom_id())
            .label("Approve")
            .style(ButtonStyle::Success),
        CreateButton::new(ComponentAction::Reject(submission_id).custom_id())
            .label("Reject")
            .style(ButtonStyle::Danger),
    ])
}

pub fn proof_modal(quest: &QuestDef) -> CreateModal {
    let mut placeholder = "Link to your video, stream or post".to_string();
    if quest.requires_snapshot {
        placeholder.push_str(" plus a screenshot link");
    }
    CreateModal::new(
        ComponentAction::Proof(quest.code.clone()).custom_id(),
        clip(&format!("Submit {}: {}", quest.code, quest.name), 45),
    )
    .components(vec![CreateActionRow::InputText(
        CreateInputText::new(InputTextStyle::Paragraph, "Proof", PROOF_INPUT_ID)
            .placeholder(placeholder)
            .max_length(PROOF_MAX_LEN)
            .required(true),
    )])
}

pub fn reject_reason_modal(submission_id: i64) -> CreateModal {
    CreateModal::new(
        ComponentAction::RejectReason(submission_id).custom_id(),
        format!("Reject submission #{submission_id}"),
    )
    .components(vec![CreateActionRow::InputText(
        CreateInputText::new(InputTextStyle::Paragraph, "Reason", REASON_INPUT_ID)
            .placeholder("Tell the member what to fix before resubmitting")
            .max_length(REASON_MAX_LEN)
            .required(true),
    )])
}
