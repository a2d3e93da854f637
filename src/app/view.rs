// SPDX-License-Identifier: GPL-3.0-only

//! Main application view
//!
//! One screen with three pages:
//! - Idle page with the scan button (or the way into manual entry)
//! - Camera page with the live preview and a cancel button
//! - Manual entry form
//!
//! Alerts are rendered through the application's dialog slot.

use crate::app::handlers::scan::manual_entry_id;
use crate::app::state::{AppModel, CameraAvailability, Message};
use crate::constants::ui;
use crate::fl;
use crate::scan::{Alert, HandoffUrl};
use cosmic::Element;
use cosmic::iced::{Alignment, ContentFit, Length};
use cosmic::widget;

impl AppModel {
    /// Build the main application view
    pub fn view(&self) -> Element<'_, Message> {
        if self.coordinator.is_scanning() {
            self.scanning_page()
        } else if self.coordinator.manual_entry_visible() {
            self.manual_entry_page()
        } else {
            self.idle_page()
        }
    }

    /// Modal alert, if the coordinator raised one
    pub fn dialog_view(&self) -> Option<Element<'_, Message>> {
        let dialog = match self.coordinator.alert()? {
            Alert::ConfirmHandoff => {
                let url = self
                    .coordinator
                    .pending_url()
                    .map(HandoffUrl::as_str)
                    .unwrap_or_default();

                widget::dialog()
                    .title(fl!("confirm-title"))
                    .body(fl!("confirm-body"))
                    .control(widget::text::body(url).font(cosmic::font::mono()))
                    .primary_action(
                        widget::button::suggested(fl!("confirm-open"))
                            .on_press(Message::ConfirmHandoff),
                    )
                    .secondary_action(
                        widget::button::standard(fl!("cancel")).on_press(Message::CancelHandoff),
                    )
            }
            Alert::PermissionRequired => widget::dialog()
                .title(fl!("permission-title"))
                .body(fl!("permission-body"))
                .icon(widget::icon::from_name("camera-disabled-symbolic").size(64))
                .primary_action(
                    widget::button::suggested(fl!("open-settings"))
                        .on_press(Message::OpenPermissionSettings),
                )
                .secondary_action(
                    widget::button::standard(fl!("cancel"))
                        .on_press(Message::DismissPermissionAlert),
                ),
        };
        Some(dialog.into())
    }

    fn idle_page(&self) -> Element<'_, Message> {
        let spacing = cosmic::theme::spacing();

        let hero = widget::icon::from_name("camera-photo-symbolic")
            .size(ui::HERO_ICON_SIZE)
            .icon();

        let mut column = widget::column()
            .push(hero)
            .push(widget::text::title3(fl!("scan-title")))
            .push(widget::text::body(fl!("scan-description")).align_x(Alignment::Center))
            .push(widget::vertical_space().height(spacing.space_s))
            .spacing(spacing.space_s)
            .align_x(Alignment::Center)
            .max_width(ui::FORM_MAX_WIDTH);

        column = match self.camera_availability {
            CameraAvailability::Unknown => {
                column.push(widget::text::caption(fl!("looking-for-cameras")))
            }
            CameraAvailability::Available => column.push(
                widget::button::suggested(fl!("scan-button"))
                    .leading_icon(widget::icon::from_name("camera-photo-symbolic"))
                    .on_press(Message::StartScan)
                    .width(Length::Fill),
            ),
            CameraAvailability::Unavailable => column
                .push(widget::text::caption(fl!("no-camera")))
                .push(
                    widget::button::standard(fl!("enter-code-button"))
                        .on_press(Message::ShowManualEntry)
                        .width(Length::Fill),
                ),
        };

        widget::container(column)
            .padding(spacing.space_l)
            .center(Length::Fill)
            .into()
    }

    fn scanning_page(&self) -> Element<'_, Message> {
        let spacing = cosmic::theme::spacing();

        let preview: Element<'_, Message> = match &self.preview {
            Some(handle) => widget::image(handle.clone())
                .content_fit(ContentFit::Contain)
                .width(Length::Fill)
                .height(Length::Fill)
                .into(),
            None => widget::container(widget::text::body(fl!("starting-camera")))
                .center(Length::Fill)
                .into(),
        };

        let overlay = widget::column()
            .push(widget::text::heading(fl!("scanning-hint")))
            .push(widget::vertical_space())
            .push(widget::button::standard(fl!("cancel")).on_press(Message::CancelScan))
            .align_x(Alignment::Center)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding([spacing.space_m, 0, ui::CANCEL_BUTTON_MARGIN, 0]);

        cosmic::iced::widget::stack![preview, overlay]
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn manual_entry_page(&self) -> Element<'_, Message> {
        let spacing = cosmic::theme::spacing();

        let input = widget::text_input(fl!("manual-placeholder"), self.coordinator.manual_input())
            .id(manual_entry_id())
            .on_input(Message::ManualInputChanged);

        let submit = widget::button::suggested(fl!("submit"))
            .on_press_maybe(
                self.coordinator
                    .can_submit_manual()
                    .then_some(Message::SubmitManualEntry),
            )
            .width(Length::Fill);

        let column = widget::column()
            .push(widget::text::title3(fl!("manual-title")))
            .push(widget::text::body(fl!("manual-description")))
            .push(input)
            .push(widget::text::caption(fl!(
                "manual-example",
                example = ui::MANUAL_ENTRY_EXAMPLE
            )))
            .push(widget::vertical_space().height(spacing.space_s))
            .push(submit)
            .push(
                widget::button::standard(fl!("cancel"))
                    .on_press(Message::DismissManualEntry)
                    .width(Length::Fill),
            )
            .spacing(spacing.space_s)
            .max_width(ui::FORM_MAX_WIDTH);

        widget::container(column)
            .padding(spacing.space_l)
            .center(Length::Fill)
            .into()
    }
}
